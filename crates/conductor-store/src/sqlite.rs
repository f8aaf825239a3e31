//! SQLite-backed durable job store.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use conductor_core::{
    now_millis, Error, Job, JobFailure, JobStatus, Mode, NewJob, Result, StatusCounts,
};

use crate::schema::{JOB_COLUMNS, SCHEMA_SQL};
use crate::types::{JobFilter, Transition, TransitionOutcome};
use crate::JobStore;

/// Durable job store. All access goes through one connection behind a mutex.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteJobStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/jobs/`). The file will be `db_dir/conductor.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("conductor.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let counts = store.counts()?;
        info!(
            "SqliteJobStore initialized: {} jobs ({} pending, {} running), path={}",
            counts.total,
            counts.pending,
            counts.running,
            store.db_path.display()
        );

        Ok(store)
    }

    /// Open a private in-memory database (tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn select_by(conn: &Connection, column: &str, value: &str) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE {} = ?1", JOB_COLUMNS, column);
        let raw = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![value], RawJob::from_row)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        raw.map(RawJob::into_job).transpose()
    }

    fn write_job(conn: &Connection, job: &Job, previous: JobStatus) -> Result<usize> {
        let result_json = job.result.as_ref().map(serde_json::to_string).transpose()?;
        let error_json = job.error.as_ref().map(serde_json::to_string).transpose()?;
        conn.prepare_cached(
            "UPDATE jobs SET status = ?1, result_json = ?2, error_json = ?3,
                 started_at = ?4, completed_at = ?5
             WHERE id = ?6 AND status = ?7",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            job.status.as_str(),
            result_json,
            error_json,
            job.started_at,
            job.completed_at,
            job.id,
            previous.as_str(),
        ])
        .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Column values as read, before JSON decoding.
struct RawJob {
    id: String,
    fingerprint: String,
    intent: String,
    mode: String,
    status: String,
    inputs_json: String,
    result_json: Option<String>,
    error_json: Option<String>,
    callback_url: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
}

impl RawJob {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            fingerprint: row.get(1)?,
            intent: row.get(2)?,
            mode: row.get(3)?,
            status: row.get(4)?,
            inputs_json: row.get(5)?,
            result_json: row.get(6)?,
            error_json: row.get(7)?,
            callback_url: row.get(8)?,
            created_at: row.get(9)?,
            started_at: row.get(10)?,
            completed_at: row.get(11)?,
        })
    }

    fn into_job(self) -> Result<Job> {
        let mode = Mode::parse(&self.mode)
            .ok_or_else(|| Error::Storage(format!("job {}: bad mode '{}'", self.id, self.mode)))?;
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            Error::Storage(format!("job {}: bad status '{}'", self.id, self.status))
        })?;
        let result = self
            .result_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let error: Option<JobFailure> = self
            .error_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Job {
            id: self.id,
            fingerprint: self.fingerprint,
            intent: self.intent,
            mode,
            status,
            inputs: serde_json::from_str(&self.inputs_json)?,
            result,
            error,
            callback_url: self.callback_url,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

impl JobStore for SqliteJobStore {
    fn get_or_create(&self, new: NewJob) -> Result<(Job, bool)> {
        let inputs_json = serde_json::to_string(&new.inputs)?;
        let conn = self.conn.lock();
        let inserted = conn
            .prepare_cached(
                "INSERT OR IGNORE INTO jobs
                    (id, fingerprint, intent, mode, status, inputs_json, callback_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![
                new.id,
                new.fingerprint,
                new.intent,
                new.mode.as_str(),
                JobStatus::Pending.as_str(),
                inputs_json,
                new.callback_url,
                now_millis(),
            ])
            .map_err(|e| Error::Database(e.to_string()))?;

        let job = Self::select_by(&conn, "fingerprint", &new.fingerprint)?.ok_or_else(|| {
            Error::Storage(format!(
                "job id {} already bound to another fingerprint",
                new.id
            ))
        })?;
        Ok((job, inserted == 1))
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock();
        Self::select_by(&conn, "id", job_id)
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock();
        Self::select_by(&conn, "fingerprint", fingerprint)
    }

    fn transition(&self, job_id: &str, transition: Transition) -> Result<TransitionOutcome> {
        let conn = self.conn.lock();
        let mut job = Self::select_by(&conn, "id", job_id)?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        let previous = job.status;
        if !transition.apply(&mut job, now_millis()) {
            return Ok(TransitionOutcome::Ignored(job));
        }
        if Self::write_job(&conn, &job, previous)? == 1 {
            Ok(TransitionOutcome::Applied(job))
        } else {
            // Another connection moved the row first; report what is stored now.
            let current = Self::select_by(&conn, "id", job_id)?
                .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
            Ok(TransitionOutcome::Ignored(current))
        }
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let conn = self.conn.lock();
        let limit = filter.limit as i64;
        let raws: Vec<RawJob> = match filter.status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM jobs WHERE status = ?1 ORDER BY created_at DESC, id ASC LIMIT ?2",
                    JOB_COLUMNS
                );
                let mut stmt = conn
                    .prepare_cached(&sql)
                    .map_err(|e| Error::Database(e.to_string()))?;
                let rows = stmt
                    .query_map(params![status.as_str(), limit], RawJob::from_row)
                    .map_err(|e| Error::Database(e.to_string()))?;
                let collected = rows
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(|e| Error::Database(e.to_string()))?;
                collected
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM jobs ORDER BY created_at DESC, id ASC LIMIT ?1",
                    JOB_COLUMNS
                );
                let mut stmt = conn
                    .prepare_cached(&sql)
                    .map_err(|e| Error::Database(e.to_string()))?;
                let rows = stmt
                    .query_map(params![limit], RawJob::from_row)
                    .map_err(|e| Error::Database(e.to_string()))?;
                let collected = rows
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(|e| Error::Database(e.to_string()))?;
                collected
            }
        };
        raws.into_iter().map(RawJob::into_job).collect()
    }

    fn counts(&self) -> Result<StatusCounts> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT status, COUNT(*) FROM jobs GROUP BY status")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row.map_err(|e| Error::Database(e.to_string()))?;
            if let Some(status) = JobStatus::parse(&status) {
                counts.add(status, n as usize);
            }
        }
        Ok(counts)
    }

    fn purge_terminal_before(&self, cutoff_millis: i64) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM jobs
             WHERE status IN ('completed', 'failed', 'cancelled') AND completed_at < ?1",
            params![cutoff_millis],
        )
        .map_err(|e| Error::Database(e.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
