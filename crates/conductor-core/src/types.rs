//! Job model shared by the store, the runtime and the HTTP surface.

use serde::{Deserialize, Serialize};

/// Concrete execution backend recorded on a job. Never `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// In-process capability call.
    Agent,
    /// External workflow webhook.
    Flow,
    /// Model Context Protocol adapter.
    Mcp,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Flow => "flow",
            Self::Mcp => "mcp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(Self::Agent),
            "flow" => Some(Self::Flow),
            "mcp" => Some(Self::Mcp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode as requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedMode {
    #[default]
    Auto,
    Agent,
    Flow,
    Mcp,
}

impl RequestedMode {
    /// The explicit backend, or `None` for `auto`.
    pub fn explicit(&self) -> Option<Mode> {
        match self {
            Self::Auto => None,
            Self::Agent => Some(Mode::Agent),
            Self::Flow => Some(Mode::Flow),
            Self::Mcp => Some(Mode::Mcp),
        }
    }
}

impl From<Mode> for RequestedMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Agent => Self::Agent,
            Mode::Flow => Self::Flow,
            Mode::Mcp => Self::Mcp,
        }
    }
}

/// Safety classification of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyClass {
    #[default]
    Safe,
    /// Requires `confirm_dangerous: true` in the inputs before execution.
    Dangerous,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn all() -> &'static [JobStatus] {
        &[
            Self::Pending,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Legal edges: pending → running → {completed|failed}, pending → cancelled.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a captured post-job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BackendTimeout,
    BackendExecution,
    NotImplemented,
    Cancelled,
    Interrupted,
}

/// Error payload stored on a failed or cancelled job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// A tracked unit of orchestrated work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub fingerprint: String,
    pub intent: String,
    pub mode: Mode,
    pub status: JobStatus,
    pub inputs: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Job {
    /// Build a fresh `pending` record.
    pub fn pending(new: NewJob, created_at: i64) -> Self {
        Self {
            id: new.id,
            fingerprint: new.fingerprint,
            intent: new.intent,
            mode: new.mode,
            status: JobStatus::Pending,
            inputs: new.inputs,
            result: None,
            error: None,
            callback_url: new.callback_url,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Execution time in milliseconds, once terminal.
    pub fn duration_ms(&self) -> Option<i64> {
        let end = self.completed_at?;
        Some(end - self.started_at.unwrap_or(self.created_at))
    }
}

/// Everything needed to create a job; timestamps and status are set by the store.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub fingerprint: String,
    pub intent: String,
    pub mode: Mode,
    pub inputs: serde_json::Value,
    pub callback_url: Option<String>,
}

/// Per-status job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus, n: usize) {
        match status {
            JobStatus::Pending => self.pending += n,
            JobStatus::Running => self.running += n,
            JobStatus::Completed => self.completed += n,
            JobStatus::Failed => self.failed += n,
            JobStatus::Cancelled => self.cancelled += n,
        }
        self.total += n;
    }
}
