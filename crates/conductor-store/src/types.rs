//! Transition requests and query filters.

use conductor_core::{FailureKind, Job, JobFailure, JobStatus};

/// A requested state change.
#[derive(Debug, Clone)]
pub enum Transition {
    /// pending → running
    Start,
    /// running → completed
    Complete(serde_json::Value),
    /// running → failed
    Fail(JobFailure),
    /// pending → cancelled
    Cancel(String),
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Self::Start => JobStatus::Running,
            Self::Complete(_) => JobStatus::Completed,
            Self::Fail(_) => JobStatus::Failed,
            Self::Cancel(_) => JobStatus::Cancelled,
        }
    }

    /// Apply to `job` in place. Returns `false` and leaves `job` unchanged
    /// when the edge is not legal from the current status.
    pub fn apply(self, job: &mut Job, now: i64) -> bool {
        let target = self.target();
        if !job.status.can_transition_to(target) {
            return false;
        }
        match self {
            Self::Start => job.started_at = Some(now),
            Self::Complete(result) => {
                job.result = Some(result);
                job.completed_at = Some(now);
            }
            Self::Fail(failure) => {
                job.error = Some(failure);
                job.completed_at = Some(now);
            }
            Self::Cancel(reason) => {
                job.error = Some(JobFailure::new(FailureKind::Cancelled, reason));
                job.completed_at = Some(now);
            }
        }
        job.status = target;
        true
    }
}

/// Result of a transition attempt.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(Job),
    /// The transition was illegal; carries the unchanged record.
    Ignored(Job),
}

impl TransitionOutcome {
    pub fn job(&self) -> &Job {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::{Mode, NewJob};

    fn pending() -> Job {
        Job::pending(
            NewJob {
                id: "job_a".into(),
                fingerprint: "fp_a".into(),
                intent: "memory.write".into(),
                mode: Mode::Agent,
                inputs: serde_json::json!({"text": "X"}),
                callback_url: None,
            },
            10,
        )
    }

    #[test]
    fn test_apply_happy_path() {
        let mut job = pending();
        assert!(Transition::Start.apply(&mut job, 20));
        assert_eq!(job.started_at, Some(20));
        assert!(Transition::Complete(serde_json::json!({"ok": true})).apply(&mut job, 30));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(30));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_terminal_is_immutable() {
        let mut job = pending();
        Transition::Start.apply(&mut job, 20);
        Transition::Complete(serde_json::json!(1)).apply(&mut job, 30);
        let before = job.clone();
        assert!(!Transition::Fail(JobFailure::new(FailureKind::BackendExecution, "late"))
            .apply(&mut job, 40));
        assert!(!Transition::Complete(serde_json::json!(2)).apply(&mut job, 40));
        assert_eq!(job, before);
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let mut job = pending();
        assert!(Transition::Cancel("caller abort".into()).apply(&mut job, 15));
        assert_eq!(job.error.as_ref().map(|e| e.kind), Some(FailureKind::Cancelled));

        let mut running = pending();
        Transition::Start.apply(&mut running, 20);
        assert!(!Transition::Cancel("too late".into()).apply(&mut running, 25));
        assert_eq!(running.status, JobStatus::Running);
    }

    #[test]
    fn test_cannot_skip_running() {
        let mut job = pending();
        assert!(!Transition::Complete(serde_json::json!(null)).apply(&mut job, 20));
        assert_eq!(job.status, JobStatus::Pending);
    }
}
