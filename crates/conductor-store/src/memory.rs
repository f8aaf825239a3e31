//! In-memory job store for tests and single-process deployments.

use std::collections::HashMap;

use parking_lot::Mutex;

use conductor_core::{now_millis, Error, Job, NewJob, Result, StatusCounts};

use crate::types::{JobFilter, Transition, TransitionOutcome};
use crate::JobStore;

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    /// Idempotency index: fingerprint → job id.
    index: HashMap<String, String>,
}

/// Job store backed by two maps under one lock.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn get_or_create(&self, new: NewJob) -> Result<(Job, bool)> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.index.get(&new.fingerprint) {
            let job = inner
                .jobs
                .get(id)
                .cloned()
                .ok_or_else(|| Error::Storage(format!("dangling index entry for {}", id)))?;
            return Ok((job, false));
        }
        if inner.jobs.contains_key(&new.id) {
            return Err(Error::Storage(format!(
                "job id {} already bound to another fingerprint",
                new.id
            )));
        }
        let job = Job::pending(new, now_millis());
        inner.index.insert(job.fingerprint.clone(), job.id.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok((job, true))
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.inner.lock().jobs.get(job_id).cloned())
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Job>> {
        let inner = self.inner.lock();
        Ok(inner
            .index
            .get(fingerprint)
            .and_then(|id| inner.jobs.get(id))
            .cloned())
    }

    fn transition(&self, job_id: &str, transition: Transition) -> Result<TransitionOutcome> {
        let mut inner = self.inner.lock();
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        if transition.apply(job, now_millis()) {
            Ok(TransitionOutcome::Applied(job.clone()))
        } else {
            Ok(TransitionOutcome::Ignored(job.clone()))
        }
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs.truncate(filter.limit);
        Ok(jobs)
    }

    fn counts(&self) -> Result<StatusCounts> {
        let inner = self.inner.lock();
        let mut counts = StatusCounts::default();
        for job in inner.jobs.values() {
            counts.add(job.status, 1);
        }
        Ok(counts)
    }

    fn purge_terminal_before(&self, cutoff_millis: i64) -> Result<usize> {
        let mut inner = self.inner.lock();
        let expired: Vec<(String, String)> = inner
            .jobs
            .values()
            .filter(|j| j.is_terminal() && j.completed_at.is_some_and(|t| t < cutoff_millis))
            .map(|j| (j.id.clone(), j.fingerprint.clone()))
            .collect();
        for (id, fingerprint) in &expired {
            inner.jobs.remove(id);
            inner.index.remove(fingerprint);
        }
        Ok(expired.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
