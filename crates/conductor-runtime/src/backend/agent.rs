use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use conductor_core::{Error, Mode, Result};

use super::{Backend, Invocation};
use crate::registry::IntentRegistry;

/// Runs registered in-process capabilities on the blocking pool.
pub struct AgentRunner {
    registry: Arc<IntentRegistry>,
}

impl AgentRunner {
    pub fn new(registry: Arc<IntentRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Backend for AgentRunner {
    fn mode(&self) -> Mode {
        Mode::Agent
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<Value> {
        let capability = self
            .registry
            .lookup(&invocation.intent)
            .and_then(|d| d.capability.clone())
            .ok_or_else(|| {
                Error::BackendExecution(format!(
                    "No agent capability for intent: {}",
                    invocation.intent
                ))
            })?;

        debug!(
            "Agent call intent={} job={}",
            invocation.intent, invocation.job_id
        );
        let inputs = invocation.inputs.clone();
        tokio::task::spawn_blocking(move || capability.call(&inputs))
            .await
            .map_err(|e| Error::BackendExecution(format!("Capability panicked: {}", e)))?
    }
}
