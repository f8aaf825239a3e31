use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use conductor_core::{Error, Mode, Result};

use super::{Backend, Invocation};

/// Path used for intents without a dedicated webhook.
const FALLBACK_PATH: &str = "/orchestrate";

/// Posts intents to workflow webhooks.
pub struct FlowRunner {
    client: Client,
    base: String,
    timeout: Duration,
    routes: HashMap<String, String>,
}

impl FlowRunner {
    /// Runner with the default route table.
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build flow client: {}", e)))?;
        let runner = Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            timeout,
            routes: HashMap::new(),
        };
        Ok(runner
            .with_route("gmail.triage", "/gmail-triage")
            .with_route("gmail.send", "/gmail-send")
            .with_route("digest.daily", "/digest-daily")
            .with_route("memory.search", "/memory-search")
            .with_route("fs.analyze", "/fs-analyze"))
    }

    pub fn with_route(mut self, intent: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.insert(intent.into(), path.into());
        self
    }

    pub fn webhook_url(&self, intent: &str) -> String {
        let path = self
            .routes
            .get(intent)
            .map(String::as_str)
            .unwrap_or(FALLBACK_PATH);
        format!("{}{}", self.base, path)
    }
}

/// Unwrap a webhook response body.
///
/// `{status:"error"}` fails, `{status:"success"}` yields `result`, anything
/// else is the result itself.
fn parse_envelope(body: Value) -> Result<Value> {
    match body.get("status").and_then(Value::as_str) {
        Some("error") => {
            let message = match body.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "Flow reported an error".to_string(),
            };
            Err(Error::BackendExecution(message))
        }
        Some("success") => Ok(body.get("result").cloned().unwrap_or(Value::Null)),
        _ => Ok(body),
    }
}

#[async_trait]
impl Backend for FlowRunner {
    fn mode(&self) -> Mode {
        Mode::Flow
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<Value> {
        let url = self.webhook_url(&invocation.intent);
        debug!("Flow call {} job={}", url, invocation.job_id);

        let payload = json!({
            "intent": invocation.intent,
            "inputs": invocation.inputs,
            "trace": invocation.trace,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::BackendTimeout(format!(
                        "Flow timed out after {}s",
                        self.timeout.as_secs_f64()
                    ))
                } else {
                    Error::BackendExecution(format!("Flow request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::BackendTimeout(format!("Flow timed out after {}s", self.timeout.as_secs_f64()))
            } else {
                Error::BackendExecution(format!("Flow body read failed: {}", e))
            }
        })?;

        if !status.is_success() {
            error!("Flow {} returned {}", url, status);
            return Err(Error::BackendExecution(format!(
                "Flow returned error {}: {}",
                status.as_u16(),
                text
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| Error::BackendExecution(format!("Flow returned invalid JSON: {}", e)))?;
        parse_envelope(body)
    }
}
