//! Execution backends. One per concrete [`Mode`].

mod agent;
mod flow;
mod mcp;

pub use agent::AgentRunner;
pub use flow::FlowRunner;
pub use mcp::McpRunner;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use conductor_core::{Error, FailureKind, JobFailure, Mode, Result};

/// One backend call for one job.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub job_id: String,
    pub intent: String,
    pub inputs: Value,
    /// `request_id`, `job_id` and caller-supplied keys.
    pub trace: Value,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn mode(&self) -> Mode;

    /// Run the intent. Errors are typed so the caller can record the failure kind.
    async fn invoke(&self, invocation: &Invocation) -> Result<Value>;
}

/// The three backends, addressed by mode.
#[derive(Clone)]
pub struct BackendSet {
    agent: Arc<dyn Backend>,
    flow: Arc<dyn Backend>,
    mcp: Arc<dyn Backend>,
}

impl BackendSet {
    pub fn new(agent: Arc<dyn Backend>, flow: Arc<dyn Backend>, mcp: Arc<dyn Backend>) -> Self {
        Self { agent, flow, mcp }
    }

    pub fn get(&self, mode: Mode) -> Arc<dyn Backend> {
        match mode {
            Mode::Agent => self.agent.clone(),
            Mode::Flow => self.flow.clone(),
            Mode::Mcp => self.mcp.clone(),
        }
    }

    /// Swap in a backend for the mode it reports.
    pub fn replace(&mut self, backend: Arc<dyn Backend>) {
        match backend.mode() {
            Mode::Agent => self.agent = backend,
            Mode::Flow => self.flow = backend,
            Mode::Mcp => self.mcp = backend,
        }
    }
}

/// Map a backend error onto the failure stored on the job.
pub fn failure_from_error(err: Error) -> JobFailure {
    match err {
        Error::BackendTimeout(msg) => JobFailure::new(FailureKind::BackendTimeout, msg),
        Error::NotImplemented(msg) => JobFailure::new(FailureKind::NotImplemented, msg),
        Error::BackendExecution(msg) => JobFailure::new(FailureKind::BackendExecution, msg),
        other => JobFailure::new(FailureKind::BackendExecution, other.to_string()),
    }
}
