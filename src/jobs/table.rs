// src/jobs/table.rs

//! Registry of background jobs by id.
//!
//! Every operation takes the table lock once. In particular the status read
//! and the eviction of a completed job happen in one critical section, so a
//! completed job is observed by at most one reader.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::debug;

use super::{Job, JobId, JobStatus};
use crate::errors::{JobshellError, Result};

/// Length of generated job ids.
pub const JOB_ID_LEN: usize = 8;

#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a job under its own id. The id must not be present yet.
    pub fn insert(&self, job: Job) -> Result<()> {
        let mut jobs = self.lock();
        if jobs.contains_key(job.id()) {
            return Err(JobshellError::DuplicateJob(job.id().to_string()));
        }
        debug!(job_id = %job.id(), "job registered");
        jobs.insert(job.id().to_string(), job);
        Ok(())
    }

    /// Draw a fresh id and insert the job built for it, under one lock.
    pub fn register(&self, make_job: impl FnOnce(JobId) -> Job) -> JobId {
        let mut jobs = self.lock();
        let id = loop {
            let candidate = generate_job_id();
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        let job = make_job(id.clone());
        debug!(job_id = %id, pid = ?job.pid(), "job registered");
        jobs.insert(id.clone(), job);
        id
    }

    /// Snapshot of a job without evicting it.
    pub fn lookup(&self, id: &str) -> Result<JobStatus> {
        self.lock()
            .get(id)
            .map(Job::status)
            .ok_or_else(|| JobshellError::JobNotFound(id.to_string()))
    }

    /// Snapshot of a job; a completed job is removed as part of the read.
    pub fn read_and_maybe_evict(&self, id: &str) -> Result<JobStatus> {
        let mut jobs = self.lock();
        let status = jobs
            .get(id)
            .map(Job::status)
            .ok_or_else(|| JobshellError::JobNotFound(id.to_string()))?;

        if !status.running {
            jobs.remove(id);
            debug!(job_id = %id, exit_code = ?status.exit_code, "completed job evicted on read");
        }
        Ok(status)
    }

    /// Run `f` against the job with `id`. Returns false if it is not present.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Job)) -> bool {
        match self.lock().get_mut(id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Random alphanumeric token; not meant to resist guessing.
pub fn generate_job_id() -> JobId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JOB_ID_LEN)
        .map(char::from)
        .collect()
}
