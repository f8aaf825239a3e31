//! Database schema SQL.

/// Jobs table. `fingerprint` is the idempotency index; the UNIQUE constraint
/// makes insert-if-absent atomic.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL UNIQUE,
    intent TEXT NOT NULL,
    mode TEXT NOT NULL,
    status TEXT NOT NULL,
    inputs_json TEXT NOT NULL,
    result_json TEXT,
    error_json TEXT,
    callback_url TEXT,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at);
"#;

pub const JOB_COLUMNS: &str = "id, fingerprint, intent, mode, status, inputs_json, result_json, \
     error_json, callback_url, created_at, started_at, completed_at";
