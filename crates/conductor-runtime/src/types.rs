//! Request and response envelopes of the orchestration API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use conductor_core::{Job, JobFailure, JobStatus, Mode, RequestedMode};

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Inbound orchestration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrateRequest {
    pub intent: String,
    #[serde(default = "empty_object")]
    pub inputs: Value,
    #[serde(default)]
    pub mode: RequestedMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// Caller trace context forwarded to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Value>,
}

impl OrchestrateRequest {
    pub fn new(intent: impl Into<String>, inputs: Value) -> Self {
        Self {
            intent: intent.into(),
            inputs,
            mode: RequestedMode::Auto,
            callback_url: None,
            trace: None,
        }
    }

    pub fn with_mode(mut self, mode: RequestedMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_callback(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_trace(mut self, trace: Value) -> Self {
        self.trace = Some(trace);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Accepted,
}

/// Answer delivered while the caller is still attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: ResponseStatus,
    /// Absent for dry-run previews, which create no job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub mode: Mode,
    pub duration_ms: i64,
}

impl SyncResponse {
    /// Envelope for a terminal job. Falls back to `elapsed_ms` when the job
    /// carries no duration.
    pub fn from_job(job: &Job, elapsed_ms: i64) -> Self {
        let status = if job.status == JobStatus::Completed {
            ResponseStatus::Success
        } else {
            ResponseStatus::Error
        };
        Self {
            status,
            job_id: Some(job.id.clone()),
            result: job.result.clone(),
            error: job.error.clone(),
            mode: job.mode,
            duration_ms: job.duration_ms().unwrap_or(elapsed_ms),
        }
    }

    pub fn preview(mode: Mode, preview: Value, elapsed_ms: i64) -> Self {
        Self {
            status: ResponseStatus::Success,
            job_id: None,
            result: Some(preview),
            error: None,
            mode,
            duration_ms: elapsed_ms,
        }
    }

    pub fn is_preview(&self) -> bool {
        self.job_id.is_none()
    }
}

/// Answer once the deadline passed; the job finishes in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub status: ResponseStatus,
    pub job_id: String,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl AcceptedResponse {
    pub fn for_job(job: &Job) -> Self {
        Self {
            status: ResponseStatus::Accepted,
            job_id: job.id.clone(),
            mode: job.mode,
            callback_url: job.callback_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Sync(SyncResponse),
    Accepted(AcceptedResponse),
}

impl Outcome {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Sync(r) => r.job_id.as_deref(),
            Self::Accepted(r) => Some(&r.job_id),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Job record as returned by the query API.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let duration_ms = job.duration_ms();
        Self { job, duration_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::FailureKind;
    use serde_json::json;

    fn job(status: JobStatus) -> Job {
        Job {
            id: "job_1".into(),
            fingerprint: "fp".into(),
            intent: "fs.analyze".into(),
            mode: Mode::Flow,
            status,
            inputs: json!({}),
            result: None,
            error: None,
            callback_url: Some("https://example.com/cb".into()),
            created_at: 100,
            started_at: Some(110),
            completed_at: Some(160),
        }
    }

    #[test]
    fn test_request_defaults() {
        let req: OrchestrateRequest = serde_json::from_str(r#"{"intent": "digest.daily"}"#).unwrap();
        assert_eq!(req.inputs, json!({}));
        assert_eq!(req.mode, RequestedMode::Auto);
        assert!(req.callback_url.is_none());

        let req: OrchestrateRequest =
            serde_json::from_str(r#"{"intent": "x", "mode": "mcp", "inputs": {"a": 1}}"#).unwrap();
        assert_eq!(req.mode, RequestedMode::Mcp);
    }

    #[test]
    fn test_request_rejects_unknown_mode() {
        assert!(serde_json::from_str::<OrchestrateRequest>(r#"{"intent": "x", "mode": "fast"}"#).is_err());
    }

    #[test]
    fn test_sync_envelope_shape() {
        let mut failed = job(JobStatus::Failed);
        failed.error = Some(JobFailure::new(FailureKind::NotImplemented, "mcp"));
        let value = serde_json::to_value(SyncResponse::from_job(&failed, 9)).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["job_id"], "job_1");
        assert_eq!(value["mode"], "flow");
        assert_eq!(value["duration_ms"], 50);
        assert_eq!(value["error"]["kind"], "not_implemented");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_preview_has_no_job_id() {
        let response = SyncResponse::preview(Mode::Agent, json!({"dry_run": true}), 2);
        assert!(response.is_preview());
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("job_id").is_none());
        assert_eq!(value["status"], "success");
    }

    #[test]
    fn test_accepted_envelope() {
        let value = serde_json::to_value(AcceptedResponse::for_job(&job(JobStatus::Running))).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "accepted",
                "job_id": "job_1",
                "mode": "flow",
                "callback_url": "https://example.com/cb",
            })
        );
    }

    #[test]
    fn test_job_view_adds_duration() {
        let value = serde_json::to_value(JobView::from(job(JobStatus::Completed))).unwrap();
        assert_eq!(value["id"], "job_1");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["duration_ms"], 50);
        assert_eq!(value["created_at"], 100);
    }
}
