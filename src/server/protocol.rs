// src/server/protocol.rs

//! JSON-RPC 2.0 message shapes and dispatch onto [`ShellService`].
//!
//! Params are parsed strictly: unknown fields, wrong types and missing
//! required fields are all rejected with `-32602` before the service sees
//! anything.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::errors::JobshellError;
use crate::service::{ExecuteRequest, ShellService};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const JOB_NOT_FOUND: i64 = -32001;

pub const EXECUTE_TOOL: &str = "execute";
pub const JOB_STATUS_TOOL: &str = "get_job_status";

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications, which get no response. An explicit `null`
    /// is a request id like any other.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<JobshellError> for RpcError {
    fn from(err: JobshellError) -> Self {
        match err {
            JobshellError::JobNotFound(id) => RpcError::new(JOB_NOT_FOUND, format!("job not found: {id}")),
            other => RpcError::new(INTERNAL_ERROR, other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result,
            error,
        }
    }
}

/// `execute` arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteParams {
    pub command: String,
    /// Milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub background: Option<bool>,
}

impl From<ExecuteParams> for ExecuteRequest {
    fn from(p: ExecuteParams) -> Self {
        Self {
            command: p.command,
            timeout_ms: p.timeout,
            background: p.background.unwrap_or(false),
        }
    }
}

/// `get_job_status` arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct JobStatusParams {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// A request resolved to something the service can do.
#[derive(Debug, Clone)]
pub enum Call {
    Execute(ExecuteParams),
    JobStatus(JobStatusParams),
    ListTools,
}

impl Call {
    pub fn parse(method: &str, params: Value) -> Result<Self, RpcError> {
        match method {
            EXECUTE_TOOL => Ok(Call::Execute(parse_params(params)?)),
            JOB_STATUS_TOOL => Ok(Call::JobStatus(parse_params(params)?)),
            "tools/list" => Ok(Call::ListTools),
            "tools/call" => {
                let call: ToolCallParams = parse_params(params)?;
                match call.name.as_str() {
                    EXECUTE_TOOL | JOB_STATUS_TOOL => Call::parse(&call.name, call.arguments),
                    other => Err(RpcError::new(INVALID_PARAMS, format!("unknown tool: {other}"))),
                }
            }
            other => Err(RpcError::new(METHOD_NOT_FOUND, format!("method not found: {other}"))),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))
}

/// Run a parsed call against the service.
pub async fn dispatch(service: &ShellService, call: Call) -> Result<Value, RpcError> {
    match call {
        Call::Execute(params) => {
            let result = service.execute(params.into()).await;
            to_value(&result)
        }
        Call::JobStatus(params) => {
            let status = service.get_job_status(&params.job_id)?;
            to_value(&status)
        }
        Call::ListTools => Ok(tool_descriptors()),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}

/// Response to input that could not be parsed at all; its id is unknown.
pub fn parse_error(message: impl Into<String>) -> RpcResponse {
    RpcResponse::new(Value::Null, Err(RpcError::new(PARSE_ERROR, message)))
}

/// Handle one raw line. Returns `None` for notifications.
pub async fn handle_line(service: &ShellService, line: &str) -> Option<RpcResponse> {
    let request: RpcRequest = match serde_json::from_str::<Value>(line) {
        Err(e) => {
            warn!(error = %e, "unparseable request line");
            return Some(parse_error(format!("parse error: {e}")));
        }
        Ok(value) => {
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value(value) {
                Ok(request) => request,
                Err(e) => {
                    return Some(RpcResponse::new(
                        id,
                        Err(RpcError::new(INVALID_REQUEST, format!("invalid request: {e}"))),
                    ));
                }
            }
        }
    };

    handle_request(service, request).await
}

pub async fn handle_request(service: &ShellService, request: RpcRequest) -> Option<RpcResponse> {
    let RpcRequest {
        jsonrpc,
        id,
        method,
        params,
    } = request;

    let outcome = if jsonrpc != "2.0" {
        Err(RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""))
    } else {
        debug!(%method, "dispatching request");
        match Call::parse(&method, params) {
            Ok(call) => dispatch(service, call).await,
            Err(e) => Err(e),
        }
    };

    match id {
        Some(id) => Some(RpcResponse::new(id, outcome)),
        None => {
            if let Err(e) = outcome {
                debug!(%method, code = e.code, error = %e.message, "notification failed");
            }
            None
        }
    }
}

/// Tool descriptors with JSON input schemas, for `tools/list`.
pub fn tool_descriptors() -> Value {
    json!({
        "tools": [
            {
                "name": EXECUTE_TOOL,
                "description": "Run a shell command. Foreground runs return stdout, stderr and exitCode (124 on timeout); background runs return a jobId and pid immediately.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "Command line passed to `sh -c`." },
                        "timeout": { "type": "integer", "minimum": 0, "description": "Foreground timeout in milliseconds." },
                        "background": { "type": "boolean", "description": "Run detached and poll with get_job_status." }
                    },
                    "required": ["command"],
                    "additionalProperties": false
                }
            },
            {
                "name": JOB_STATUS_TOOL,
                "description": "Read a background job's output and exit code. A completed job can be read once; later reads fail with job not found.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "jobId": { "type": "string" }
                    },
                    "required": ["jobId"],
                    "additionalProperties": false
                }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_params_reject_unknown_fields() {
        let err = Call::parse(EXECUTE_TOOL, json!({"command": "ls", "cwd": "/"})).unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("cwd"));
    }

    #[test]
    fn execute_params_require_command_and_typed_fields() {
        assert_eq!(Call::parse(EXECUTE_TOOL, Value::Null).unwrap_err().code, INVALID_PARAMS);
        assert_eq!(
            Call::parse(EXECUTE_TOOL, json!({"command": "ls", "timeout": "soon"}))
                .unwrap_err()
                .code,
            INVALID_PARAMS
        );
    }

    #[test]
    fn execute_params_map_to_request() {
        let Call::Execute(params) =
            Call::parse(EXECUTE_TOOL, json!({"command": "ls", "timeout": 10, "background": true})).unwrap()
        else {
            panic!("expected execute call");
        };
        let req = ExecuteRequest::from(params);
        assert_eq!(req.command, "ls");
        assert_eq!(req.timeout_ms, Some(10));
        assert!(req.background);
    }

    #[test]
    fn job_status_params_use_camel_case() {
        assert!(matches!(
            Call::parse(JOB_STATUS_TOOL, json!({"jobId": "abc"})),
            Ok(Call::JobStatus(JobStatusParams { job_id })) if job_id == "abc"
        ));
        assert!(Call::parse(JOB_STATUS_TOOL, json!({"job_id": "abc"})).is_err());
    }

    #[test]
    fn tools_call_unwraps_arguments() {
        let call = Call::parse(
            "tools/call",
            json!({"name": "get_job_status", "arguments": {"jobId": "x1"}}),
        )
        .unwrap();
        assert!(matches!(call, Call::JobStatus(p) if p.job_id == "x1"));

        let err = Call::parse("tools/call", json!({"name": "rm", "arguments": {}})).unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[test]
    fn unknown_method() {
        assert_eq!(Call::parse("shutdown", Value::Null).unwrap_err().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn job_not_found_maps_to_its_own_code() {
        let err = RpcError::from(JobshellError::JobNotFound("zz".into()));
        assert_eq!(err.code, JOB_NOT_FOUND);
        assert!(err.message.contains("zz"));
    }

    #[tokio::test]
    async fn malformed_line_is_parse_error() {
        let service = ShellService::default();
        let resp = handle_line(&service, "{not json").await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let service = ShellService::default();
        let line = r#"{"jsonrpc":"2.0","method":"tools/list"}"#;
        assert!(handle_line(&service, line).await.is_none());
    }

    #[tokio::test]
    async fn explicit_null_id_gets_a_response() {
        let service = ShellService::default();
        let line = r#"{"jsonrpc":"2.0","id":null,"method":"tools/list"}"#;
        let resp = handle_line(&service, line).await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn wrong_version_is_invalid_request() {
        let service = ShellService::default();
        let line = r#"{"jsonrpc":"1.0","id":3,"method":"tools/list"}"#;
        let resp = handle_line(&service, line).await.unwrap();
        assert_eq!(resp.id, json!(3));
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }
}
