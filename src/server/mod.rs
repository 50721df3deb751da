// src/server/mod.rs

//! Line-delimited JSON-RPC over a byte stream (stdin/stdout in production).
//!
//! Each request line is handled on its own Tokio task, so a long foreground
//! command never holds up a status read. Responses go through a single
//! writer task and may be written out of request order; match them by `id`.

pub mod protocol;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::service::ShellService;

pub use protocol::{RpcError, RpcRequest, RpcResponse};

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// Input that is not UTF-8 is answered with a parse error, like malformed
/// JSON. Requests still in flight at EOF are allowed to finish and answer before
/// this returns.
pub async fn serve<R, W>(service: ShellService, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(64);
    let writer_task = tokio::spawn(write_responses(writer, rx));

    let mut buf = Vec::new();
    let mut in_flight = JoinSet::new();

    info!("jobshell server accepting requests");

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        while in_flight.try_join_next().is_some() {}

        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "request line is not valid UTF-8");
                let response = protocol::parse_error(format!("parse error: {e}"));
                send_response(&tx, &response).await;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let service = service.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = protocol::handle_line(&service, &line).await {
                send_response(&tx, &response).await;
            }
        });
    }

    debug!(pending = in_flight.len(), "input closed; draining in-flight requests");
    while in_flight.join_next().await.is_some() {}

    drop(tx);
    writer_task.await.map_err(anyhow::Error::from)??;

    info!("jobshell server stopped");
    Ok(())
}

async fn send_response(tx: &mpsc::Sender<String>, response: &RpcResponse) {
    match serde_json::to_string(response) {
        Ok(encoded) => {
            if tx.send(encoded).await.is_err() {
                warn!("response writer closed; dropping response");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode response"),
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
