//! Best-effort terminal-state notifications.
//!
//! Delivery outcome is logged only; it never touches the job record.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use conductor_core::{ConductorConfig, Error, Job, JobFailure, JobStatus, Result};

use crate::signing::{HmacSigner, NoopSigner, PayloadSigner};

/// Body POSTed to `callback_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub job_id: String,
    pub intent: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl CallbackPayload {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            intent: job.intent.clone(),
            status: job.status,
            result: job.result.clone(),
            error: job.error.clone(),
            duration_ms: job.duration_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallbackPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub backoff: Duration,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl CallbackPolicy {
    pub fn from_config(config: &ConductorConfig) -> Self {
        Self {
            max_attempts: config.callback_max_attempts.max(1),
            backoff: config.callback_backoff(),
            timeout: config.callback_timeout(),
        }
    }

    /// Delay slept before `attempt` (1-based). Zero for the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff.saturating_mul(1u32 << (attempt - 2).min(16))
    }
}

#[derive(Clone)]
pub struct CallbackDispatcher {
    client: Client,
    policy: CallbackPolicy,
    signer: Arc<dyn PayloadSigner>,
}

impl CallbackDispatcher {
    pub fn new(policy: CallbackPolicy, signer: Arc<dyn PayloadSigner>) -> Result<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build callback client: {}", e)))?;
        Ok(Self {
            client,
            policy,
            signer,
        })
    }

    /// Signs with HMAC when a secret is configured.
    pub fn from_config(config: &ConductorConfig) -> Result<Self> {
        let signer: Arc<dyn PayloadSigner> = match &config.hmac_secret {
            Some(secret) => Arc::new(HmacSigner::new(secret, &config.hmac_header)),
            None => Arc::new(NoopSigner),
        };
        Self::new(CallbackPolicy::from_config(config), signer)
    }

    /// Deliver in the background if the job has a callback URL.
    pub fn spawn(&self, job: &Job) -> Option<JoinHandle<Result<u32>>> {
        let url = job.callback_url.clone()?;
        let payload = CallbackPayload::from_job(job);
        let dispatcher = self.clone();
        Some(tokio::spawn(async move {
            dispatcher.deliver(&url, &payload).await
        }))
    }

    /// POST `payload` with retries. Returns the attempt that succeeded.
    pub async fn deliver(&self, url: &str, payload: &CallbackPayload) -> Result<u32> {
        let body = serde_json::to_vec(payload)?;
        let signature = self.signer.sign(&body);
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
            if let Some(sig) = &signature {
                request = request.header(self.signer.header_name(), sig.as_str());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        "Callback delivered job={} attempt={}",
                        payload.job_id, attempt
                    );
                    return Ok(attempt);
                }
                Ok(response) => last_error = format!("status {}", response.status()),
                Err(e) => last_error = e.to_string(),
            }
            warn!(
                "Callback attempt {}/{} failed job={}: {}",
                attempt, self.policy.max_attempts, payload.job_id, last_error
            );
        }

        error!(
            "Callback delivery exhausted job={} url={}: {}",
            payload.job_id, url, last_error
        );
        Err(Error::CallbackDelivery(format!(
            "{} after {} attempts: {}",
            url, self.policy.max_attempts, last_error
        )))
    }
}
