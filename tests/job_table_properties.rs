use proptest::prelude::*;
use jobshell::errors::JobshellError;
use jobshell::exec::{OutputStream, ProcessEvent};
use jobshell::jobs::{Job, JobTable};

#[derive(Debug, Clone)]
enum Op {
    Append { job: usize, stderr: bool, data: Vec<u8> },
    Complete { job: usize, code: i32 },
    Read { job: usize },
}

fn op_strategy(num_jobs: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..num_jobs, any::<bool>(), proptest::collection::vec(b'a'..=b'z', 1..8))
            .prop_map(|(job, stderr, data)| Op::Append { job, stderr, data }),
        (0..num_jobs, 0..256i32).prop_map(|(job, code)| Op::Complete { job, code }),
        (0..num_jobs).prop_map(|job| Op::Read { job }),
    ]
}

/// What we expect each job to look like.
#[derive(Debug, Default, Clone)]
struct Model {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<i32>,
    evicted: bool,
}

proptest! {
    #[test]
    fn test_job_table_matches_model(
        num_jobs in 1..5usize,
        ops in proptest::collection::vec(op_strategy(5), 1..60),
    ) {
        let table = JobTable::new();
        let ids: Vec<String> = (0..num_jobs)
            .map(|i| table.register(|id| Job::running(id, "cmd", 1000 + i as u32)))
            .collect();
        let mut models = vec![Model::default(); num_jobs];

        for op in ops {
            match op {
                Op::Append { job, stderr, data } if job < num_jobs => {
                    let stream = if stderr { OutputStream::Stderr } else { OutputStream::Stdout };
                    let present = table.update(&ids[job], |j| {
                        j.apply(ProcessEvent::Output { stream, data: data.clone() });
                    });
                    let model = &mut models[job];
                    prop_assert_eq!(present, !model.evicted);
                    if present && model.exit_code.is_none() {
                        if stderr { model.stderr.extend(&data) } else { model.stdout.extend(&data) }
                    }
                }
                Op::Complete { job, code } if job < num_jobs => {
                    table.update(&ids[job], |j| j.apply(ProcessEvent::Exited { code }));
                    let model = &mut models[job];
                    if !model.evicted && model.exit_code.is_none() {
                        model.exit_code = Some(code);
                    }
                }
                Op::Read { job } if job < num_jobs => {
                    let model = &mut models[job];
                    match table.read_and_maybe_evict(&ids[job]) {
                        Ok(status) => {
                            prop_assert!(!model.evicted);
                            prop_assert_eq!(status.stdout.as_bytes(), model.stdout.as_slice());
                            prop_assert_eq!(status.stderr.as_bytes(), model.stderr.as_slice());
                            prop_assert_eq!(status.exit_code, model.exit_code);
                            prop_assert_eq!(status.running, model.exit_code.is_none());
                            if model.exit_code.is_some() {
                                model.evicted = true;
                            }
                        }
                        Err(JobshellError::JobNotFound(_)) => prop_assert!(model.evicted),
                        Err(e) => prop_assert!(false, "unexpected error: {e}"),
                    }
                }
                _ => {}
            }
        }

        let live = models.iter().filter(|m| !m.evicted).count();
        prop_assert_eq!(table.len(), live);
    }
}
