//! Conductor Store: job records and the idempotency index behind one atomic API.
//!
//! Both implementations serialize every mutation behind a single lock, so
//! get-or-create is insert-if-absent and a transition is check-then-set with
//! no interleaving.

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;
pub use types::*;

use conductor_core::{Job, NewJob, Result, StatusCounts};

/// Storage contract required by the orchestration engine.
pub trait JobStore: Send + Sync {
    /// Insert a `pending` job unless one with the same fingerprint exists.
    ///
    /// Returns the stored record and whether this call created it.
    fn get_or_create(&self, new: NewJob) -> Result<(Job, bool)>;

    fn get(&self, job_id: &str) -> Result<Option<Job>>;

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Job>>;

    /// Apply a transition. Illegal transitions leave the record untouched and
    /// report `Ignored` with the current state.
    fn transition(&self, job_id: &str, transition: Transition) -> Result<TransitionOutcome>;

    /// Jobs newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    fn counts(&self) -> Result<StatusCounts>;

    /// Delete terminal jobs that completed before `cutoff_millis`, index entries included.
    fn purge_terminal_before(&self, cutoff_millis: i64) -> Result<usize>;

    /// Short backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod conformance;
