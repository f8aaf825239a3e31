//! Startup recovery and retention.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use conductor_core::{now_millis, FailureKind, JobFailure, JobStatus, Result};
use conductor_store::{JobFilter, JobStore, Transition};

const RECOVERY_BATCH: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// `running` jobs marked failed.
    pub interrupted: usize,
    /// `pending` jobs marked cancelled.
    pub cancelled: usize,
}

/// Settle jobs a previous process left non-terminal. No callbacks fire.
pub fn recover_interrupted(store: &dyn JobStore) -> Result<RecoveryReport> {
    let report = RecoveryReport {
        interrupted: settle(store, JobStatus::Running, || {
            Transition::Fail(JobFailure::new(
                FailureKind::Interrupted,
                "Process restarted while the job was running",
            ))
        })?,
        cancelled: settle(store, JobStatus::Pending, || {
            Transition::Cancel("Process restarted before the job started".into())
        })?,
    };

    if report != RecoveryReport::default() {
        warn!(
            "Recovered {} interrupted and {} never-started jobs",
            report.interrupted, report.cancelled
        );
    }
    Ok(report)
}

fn settle(
    store: &dyn JobStore,
    status: JobStatus,
    transition: impl Fn() -> Transition,
) -> Result<usize> {
    let filter = JobFilter {
        status: Some(status),
        limit: RECOVERY_BATCH,
    };
    let mut settled = 0;
    loop {
        let batch = store.list(&filter)?;
        if batch.is_empty() {
            break;
        }
        let mut applied = 0;
        for job in &batch {
            if store.transition(&job.id, transition())?.is_applied() {
                applied += 1;
            }
        }
        settled += applied;
        if applied == 0 {
            break;
        }
    }
    Ok(settled)
}

/// Periodically delete terminal jobs older than `retention`.
pub fn spawn_retention_task(
    store: Arc<dyn JobStore>,
    retention: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Job retention task started: keep {}h, sweep every {}s",
            retention.as_secs() / 3600,
            every.as_secs()
        );
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let cutoff = now_millis() - retention.as_millis() as i64;
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.purge_terminal_before(cutoff)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => info!("Purged {} expired jobs", n),
                Ok(Err(e)) => warn!("Job purge failed: {}", e),
                Err(e) => warn!("Job purge task failed: {}", e),
            }
        }
    })
}
