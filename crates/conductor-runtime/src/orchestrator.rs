//! The orchestration engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use conductor_core::{ConductorConfig, Job, Result, StatusCounts};
use conductor_store::{JobFilter, JobStore, TransitionOutcome};

use crate::backend::{AgentRunner, Backend, BackendSet, FlowRunner, McpRunner};
use crate::callback::CallbackDispatcher;
use crate::fingerprint::{Fingerprint, IdempotencyIndex};
use crate::promoter::{Dispatch, Promoter};
use crate::registry::IntentRegistry;
use crate::safety::{GateDecision, SafetyGate};
use crate::selector::ModeSelector;
use crate::types::{AcceptedResponse, OrchestrateRequest, Outcome, SyncResponse};
use crate::validation::{validate_callback_url, validate_inputs, validate_intent_name};

/// Turns intents into tracked jobs.
///
/// Pre-job errors (unknown intent, validation) are returned as `Err` and never
/// touch the store. Everything after job creation is reported through the
/// returned [`Outcome`].
pub struct Orchestrator {
    registry: Arc<IntentRegistry>,
    selector: ModeSelector,
    store: Arc<dyn JobStore>,
    index: IdempotencyIndex,
    promoter: Promoter,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(
        config: &ConductorConfig,
        store: Arc<dyn JobStore>,
        registry: Arc<IntentRegistry>,
    ) -> Result<Self> {
        let backends = BackendSet::new(
            Arc::new(AgentRunner::new(registry.clone())),
            Arc::new(FlowRunner::new(
                config.flow_webhook_base.clone(),
                config.flow_timeout(),
            )?),
            Arc::new(McpRunner),
        );
        let callbacks = CallbackDispatcher::from_config(config)?;

        info!(
            "Orchestrator ready: {} intents, default mode {}, deadline {}ms, store {}",
            registry.len(),
            config.default_mode,
            config.sync_deadline_ms,
            store.backend_name()
        );

        Ok(Self {
            selector: ModeSelector::new(config.default_mode),
            index: IdempotencyIndex::new(store.clone()),
            promoter: Promoter::new(store.clone(), backends, callbacks),
            deadline: config.sync_deadline(),
            registry,
            store,
        })
    }

    /// Replace the backend serving `backend.mode()`.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.promoter.replace_backend(backend);
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackDispatcher) -> Self {
        self.promoter.set_callbacks(callbacks);
        self
    }

    pub fn with_selector(mut self, selector: ModeSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn submit(&self, req: OrchestrateRequest) -> Result<Outcome> {
        let started = Instant::now();

        validate_intent_name(&req.intent)?;
        let resolution = self.selector.resolve(&self.registry, &req.intent, req.mode)?;
        validate_inputs(&req.inputs, &resolution.descriptor)?;
        if let Some(url) = &req.callback_url {
            validate_callback_url(url)?;
        }

        let fingerprint = Fingerprint::compute(&req.intent, &req.inputs);
        if let Some(existing) = self.index.lookup(&fingerprint)? {
            debug!("Replaying job {} ({})", existing.id, existing.status);
            return self.replay(existing, started).await;
        }

        if let GateDecision::Preview(preview) =
            SafetyGate::check(&req.intent, &resolution.descriptor, &req.inputs)
        {
            return Ok(Outcome::Sync(SyncResponse::preview(
                resolution.mode,
                preview,
                elapsed_ms(started),
            )));
        }

        let (job, created) = self.index.get_or_create(
            &fingerprint,
            &req.intent,
            &req.inputs,
            resolution.mode,
            req.callback_url.clone(),
        )?;
        if !created {
            // Lost the creation race to a concurrent identical request.
            return self.replay(job, started).await;
        }

        info!("Job {} created intent={} mode={}", job.id, job.intent, job.mode);
        let trace = build_trace(req.trace, &job.id);
        let dispatch = self.promoter.dispatch(job, trace, self.deadline).await?;
        Ok(outcome(dispatch, started))
    }

    async fn replay(&self, job: Job, started: Instant) -> Result<Outcome> {
        let dispatch = self.promoter.await_existing(job, self.deadline).await?;
        Ok(outcome(dispatch, started))
    }

    pub fn job(&self, job_id: &str) -> Result<Option<Job>> {
        self.store.get(job_id)
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.store.list(filter)
    }

    pub fn counts(&self) -> Result<StatusCounts> {
        self.store.counts()
    }

    /// Cancel a job that has not started. Any other state is left as is.
    pub fn cancel(&self, job_id: &str) -> Result<TransitionOutcome> {
        self.promoter.cancel(job_id, "Cancelled by request")
    }

    pub fn registry(&self) -> &IntentRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

fn outcome(dispatch: Dispatch, started: Instant) -> Outcome {
    match dispatch {
        Dispatch::Completed(job) => Outcome::Sync(SyncResponse::from_job(&job, elapsed_ms(started))),
        Dispatch::Accepted(job) => Outcome::Accepted(AcceptedResponse::for_job(&job)),
    }
}

/// Caller trace keys plus `job_id`, and a generated `request_id` if absent.
pub fn build_trace(caller: Option<Value>, job_id: &str) -> Value {
    let mut trace = match caller {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    trace.insert("job_id".into(), Value::String(job_id.to_string()));
    let has_request_id = trace
        .get("request_id")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_request_id {
        let id = uuid::Uuid::new_v4().simple().to_string();
        trace.insert("request_id".into(), Value::String(format!("req_{}", &id[..8])));
    }
    Value::Object(trace)
}
