//! Sync/async promotion.
//!
//! Execution runs as its own task. The caller races a timer against its join
//! handle; when the timer wins the handle is dropped, which detaches the task
//! without cancelling it. The task performs the terminal transition and fires
//! the callback either way.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info, warn};

use conductor_core::{now_millis, Error, FailureKind, Job, JobFailure, Mode, Result};
use conductor_store::{JobStore, Transition, TransitionOutcome};

use crate::backend::{failure_from_error, Backend, BackendSet, Invocation};
use crate::callback::CallbackDispatcher;

/// Poll interval when waiting on a job this process is not executing.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Completion signals for jobs executing in this process.
#[derive(Default)]
pub struct InFlight {
    waiters: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(self: &Arc<Self>, job_id: &str) -> InFlightGuard {
        let (tx, rx) = watch::channel(false);
        self.waiters.lock().insert(job_id.to_string(), rx);
        InFlightGuard {
            inflight: self.clone(),
            job_id: job_id.to_string(),
            tx,
        }
    }

    pub fn subscribe(&self, job_id: &str) -> Option<watch::Receiver<bool>> {
        self.waiters.lock().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Signals completion and drops the entry when the execution unit ends.
struct InFlightGuard {
    inflight: Arc<InFlight>,
    job_id: String,
    tx: watch::Sender<bool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(true);
        self.inflight.waiters.lock().remove(&self.job_id);
    }
}

/// How a dispatch was answered.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Terminal before the deadline.
    Completed(Job),
    /// Deadline passed; the job keeps running in the background.
    Accepted(Job),
}

#[derive(Clone)]
pub struct Promoter {
    store: Arc<dyn JobStore>,
    backends: BackendSet,
    callbacks: CallbackDispatcher,
    inflight: Arc<InFlight>,
}

impl Promoter {
    pub fn new(store: Arc<dyn JobStore>, backends: BackendSet, callbacks: CallbackDispatcher) -> Self {
        Self {
            store,
            backends,
            callbacks,
            inflight: Arc::new(InFlight::new()),
        }
    }

    pub fn replace_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backends.replace(backend);
    }

    pub fn set_callbacks(&mut self, callbacks: CallbackDispatcher) {
        self.callbacks = callbacks;
    }

    pub fn inflight(&self) -> &InFlight {
        &self.inflight
    }

    /// Start executing a freshly created `pending` job and answer within `deadline`.
    pub async fn dispatch(&self, job: Job, trace: Value, deadline: Duration) -> Result<Dispatch> {
        let guard = self.inflight.register(&job.id);
        let invocation = Invocation {
            job_id: job.id.clone(),
            intent: job.intent.clone(),
            inputs: job.inputs.clone(),
            trace,
        };
        let unit = self.clone();
        let mode = job.mode;

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let job_id = invocation.job_id.clone();
            let result = unit.execute(mode, invocation).await;
            if let Err(e) = &result {
                error!("Job {} bookkeeping failed: {}", job_id, e);
            }
            result
        });

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(result)) => Ok(Dispatch::Completed(result?)),
            Ok(Err(e)) => Err(Error::Internal(format!("Execution task for {} failed: {}", job.id, e))),
            Err(_) => {
                info!(
                    "Job {} still running after {}ms, promoted to async",
                    job.id,
                    deadline.as_millis()
                );
                Ok(Dispatch::Accepted(job))
            }
        }
    }

    /// The execution unit: start, invoke, record the terminal state, notify.
    async fn execute(&self, mode: Mode, invocation: Invocation) -> Result<Job> {
        let started = self.store.transition(&invocation.job_id, Transition::Start)?;
        if !started.is_applied() {
            // Cancelled (or otherwise moved on) before it could start.
            return Ok(started.into_job());
        }

        let backend = self.backends.get(mode);
        let outcome = AssertUnwindSafe(backend.invoke(&invocation))
            .catch_unwind()
            .await;

        let transition = match outcome {
            Ok(Ok(result)) => Transition::Complete(result),
            Ok(Err(e)) => {
                warn!("Job {} ({}) failed: {}", invocation.job_id, invocation.intent, e);
                Transition::Fail(failure_from_error(e))
            }
            Err(_) => {
                error!("Job {} backend panicked", invocation.job_id);
                Transition::Fail(JobFailure::new(
                    FailureKind::BackendExecution,
                    "Backend panicked during invocation",
                ))
            }
        };

        let finished = self.finish(&invocation.job_id, transition)?;
        if finished.is_applied() {
            let job = finished.job();
            info!(
                "Job {} {} in {}ms",
                job.id,
                job.status,
                job.duration_ms().unwrap_or_default()
            );
            self.callbacks.spawn(job);
        }
        Ok(finished.into_job())
    }

    /// Record the terminal state of a running job.
    ///
    /// A failed write is retried once. If that fails too the job is failed
    /// with the write error, so it never stays `running`.
    fn finish(&self, job_id: &str, transition: Transition) -> Result<TransitionOutcome> {
        match self.store.transition(job_id, transition.clone()) {
            Ok(outcome) => return Ok(outcome),
            Err(e) => warn!("Job {} terminal write failed, retrying: {}", job_id, e),
        }
        match self.store.transition(job_id, transition) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Job {} terminal write failed twice: {}", job_id, e);
                self.store.transition(
                    job_id,
                    Transition::Fail(JobFailure::new(
                        FailureKind::BackendExecution,
                        format!("Failed to record job outcome: {}", e),
                    )),
                )
            }
        }
    }

    /// Cancel a job that has not started, notifying its callback if it had one.
    pub fn cancel(&self, job_id: &str, reason: &str) -> Result<TransitionOutcome> {
        let outcome = self
            .store
            .transition(job_id, Transition::Cancel(reason.to_string()))?;
        if outcome.is_applied() {
            info!("Job {} cancelled", job_id);
            self.callbacks.spawn(outcome.job());
        }
        Ok(outcome)
    }

    /// Answer for a job some earlier request created.
    ///
    /// Waits only for what is left of that job's own deadline window,
    /// measured from its creation.
    pub async fn await_existing(&self, job: Job, deadline: Duration) -> Result<Dispatch> {
        if job.is_terminal() {
            return Ok(Dispatch::Completed(job));
        }

        let elapsed = Duration::from_millis((now_millis() - job.created_at).max(0) as u64);
        let remaining = deadline.saturating_sub(elapsed);
        if remaining.is_zero() {
            return Ok(Dispatch::Accepted(job));
        }

        if let Ok(waited) = tokio::time::timeout(remaining, self.wait_terminal(&job.id)).await {
            waited?;
        }

        let current = self
            .store
            .get(&job.id)?
            .ok_or_else(|| Error::NotFound(format!("Job {}", job.id)))?;
        if current.is_terminal() {
            Ok(Dispatch::Completed(current))
        } else {
            Ok(Dispatch::Accepted(current))
        }
    }

    async fn wait_terminal(&self, job_id: &str) -> Result<()> {
        if let Some(mut rx) = self.inflight.subscribe(job_id) {
            let _ = rx.wait_for(|done| *done).await;
            return Ok(());
        }
        // Created by a concurrent request that has not registered yet.
        loop {
            match self.store.get(job_id)? {
                Some(current) if !current.is_terminal() => {}
                _ => return Ok(()),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use conductor_core::{JobStatus, NewJob, StatusCounts};
    use conductor_store::{JobFilter, MemoryJobStore};
    use serde_json::json;

    use crate::backend::McpRunner;
    use crate::callback::CallbackPolicy;
    use crate::signing::NoopSigner;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
    }

    struct Scripted {
        delay: Duration,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Backend for Scripted {
        fn mode(&self) -> Mode {
            Mode::Agent
        }

        async fn invoke(&self, invocation: &Invocation) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.behavior {
                Behavior::Succeed => Ok(json!({"echo": invocation.inputs})),
                Behavior::Fail => Err(Error::BackendExecution("disk full".into())),
                Behavior::Panic => panic!("backend bug"),
            }
        }
    }

    fn promoter(delay_ms: u64, behavior: Behavior) -> (Promoter, Arc<MemoryJobStore>, Arc<AtomicUsize>) {
        let store = Arc::new(MemoryJobStore::new());
        let (promoter, calls) = promoter_over(store.clone(), delay_ms, behavior);
        (promoter, store, calls)
    }

    fn promoter_over(
        store: Arc<dyn JobStore>,
        delay_ms: u64,
        behavior: Behavior,
    ) -> (Promoter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let scripted: Arc<dyn Backend> = Arc::new(Scripted {
            delay: Duration::from_millis(delay_ms),
            behavior,
            calls: calls.clone(),
        });
        let backends = BackendSet::new(scripted, Arc::new(McpRunner), Arc::new(McpRunner));
        let callbacks = CallbackDispatcher::new(
            CallbackPolicy {
                max_attempts: 1,
                backoff: Duration::from_millis(1),
                timeout: Duration::from_secs(1),
            },
            Arc::new(NoopSigner),
        )
        .unwrap();
        (Promoter::new(store, backends, callbacks), calls)
    }

    /// Memory store whose next `failures` completion writes error out.
    struct FlakyStore {
        inner: MemoryJobStore,
        failures: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryJobStore::new(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    impl JobStore for FlakyStore {
        fn get_or_create(&self, new: NewJob) -> Result<(Job, bool)> {
            self.inner.get_or_create(new)
        }

        fn get(&self, job_id: &str) -> Result<Option<Job>> {
            self.inner.get(job_id)
        }

        fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Job>> {
            self.inner.find_by_fingerprint(fingerprint)
        }

        fn transition(&self, job_id: &str, transition: Transition) -> Result<TransitionOutcome> {
            let fail = matches!(transition, Transition::Complete(_))
                && self
                    .failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if fail {
                return Err(Error::Database("database is locked".into()));
            }
            self.inner.transition(job_id, transition)
        }

        fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
            self.inner.list(filter)
        }

        fn counts(&self) -> Result<StatusCounts> {
            self.inner.counts()
        }

        fn purge_terminal_before(&self, cutoff_millis: i64) -> Result<usize> {
            self.inner.purge_terminal_before(cutoff_millis)
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    fn create(store: &MemoryJobStore, tag: &str) -> Job {
        let (job, created) = store
            .get_or_create(NewJob {
                id: format!("job_{}", tag),
                fingerprint: format!("fp_{}", tag),
                intent: "memory.write".into(),
                mode: Mode::Agent,
                inputs: json!({"text": tag}),
                callback_url: None,
            })
            .unwrap();
        assert!(created);
        job
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_backend_answers_sync() {
        let (promoter, store, calls) = promoter(100, Behavior::Succeed);
        let job = create(&store, "fast");

        match promoter.dispatch(job, json!({}), Duration::from_secs(8)).await.unwrap() {
            Dispatch::Completed(job) => {
                assert_eq!(job.status, JobStatus::Completed);
                assert_eq!(job.result.unwrap()["echo"]["text"], "fast");
            }
            Dispatch::Accepted(_) => panic!("expected sync completion"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(promoter.inflight().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_is_promoted_and_finishes() {
        let (promoter, store, _) = promoter(10_000, Behavior::Succeed);
        let job = create(&store, "slow");

        let dispatch = promoter
            .dispatch(job.clone(), json!({}), Duration::from_secs(8))
            .await
            .unwrap();
        assert!(matches!(dispatch, Dispatch::Accepted(ref j) if j.id == job.id));
        assert_eq!(store.get(&job.id).unwrap().unwrap().status, JobStatus::Running);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let finished = store.get(&job.id).unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_captured_not_raised() {
        let (promoter, store, _) = promoter(10, Behavior::Fail);
        let job = create(&store, "fail");

        match promoter.dispatch(job, json!({}), Duration::from_secs(8)).await.unwrap() {
            Dispatch::Completed(job) => {
                assert_eq!(job.status, JobStatus::Failed);
                let error = job.error.unwrap();
                assert_eq!(error.kind, FailureKind::BackendExecution);
                assert_eq!(error.message, "disk full");
            }
            Dispatch::Accepted(_) => panic!("expected sync failure"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_never_leaves_job_running() {
        let (promoter, store, _) = promoter(10, Behavior::Panic);
        let job = create(&store, "panic");

        match promoter.dispatch(job, json!({}), Duration::from_secs(8)).await.unwrap() {
            Dispatch::Completed(job) => assert_eq!(job.status, JobStatus::Failed),
            Dispatch::Accepted(_) => panic!("expected sync failure"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_is_not_invoked() {
        let (promoter, store, calls) = promoter(10, Behavior::Succeed);
        let job = create(&store, "cancel");
        store
            .transition(&job.id, Transition::Cancel("caller abort".into()))
            .unwrap();

        match promoter.dispatch(job, json!({}), Duration::from_secs(8)).await.unwrap() {
            Dispatch::Completed(job) => assert_eq!(job.status, JobStatus::Cancelled),
            Dispatch::Accepted(_) => panic!("expected terminal"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_existing_waits_for_inflight() {
        let (promoter, store, calls) = promoter(5_000, Behavior::Succeed);
        let job = create(&store, "shared");

        let first = promoter
            .dispatch(job.clone(), json!({}), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(first, Dispatch::Accepted(_)));

        let pending = store.get(&job.id).unwrap().unwrap();
        match promoter.await_existing(pending, Duration::from_secs(30)).await.unwrap() {
            Dispatch::Completed(job) => assert_eq!(job.status, JobStatus::Completed),
            Dispatch::Accepted(_) => panic!("expected completion inside the window"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_existing_outside_window() {
        let (promoter, store, _) = promoter(10, Behavior::Succeed);
        let mut job = create(&store, "stale");
        job.created_at -= 10_000;

        let dispatch = promoter
            .await_existing(job, Duration::from_secs(8))
            .await
            .unwrap();
        assert!(matches!(dispatch, Dispatch::Accepted(_)));
    }

    #[tokio::test]
    async fn test_await_existing_terminal_is_immediate() {
        let (promoter, store, _) = promoter(10, Behavior::Succeed);
        let job = create(&store, "done");
        store.transition(&job.id, Transition::Start).unwrap();
        let done = store
            .transition(&job.id, Transition::Complete(json!({"ok": true})))
            .unwrap()
            .into_job();

        match promoter.await_existing(done, Duration::ZERO).await.unwrap() {
            Dispatch::Completed(job) => assert_eq!(job.result.unwrap()["ok"], true),
            Dispatch::Accepted(_) => panic!("terminal jobs answer sync"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_write_is_retried() {
        let store = Arc::new(FlakyStore::new(1));
        let (promoter, _) = promoter_over(store.clone(), 10, Behavior::Succeed);
        let job = create(&store.inner, "retry");

        match promoter.dispatch(job, json!({}), Duration::from_secs(8)).await.unwrap() {
            Dispatch::Completed(job) => {
                assert_eq!(job.status, JobStatus::Completed);
                assert_eq!(job.result.unwrap()["echo"]["text"], "retry");
            }
            Dispatch::Accepted(_) => panic!("expected sync completion"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecordable_result_fails_job() {
        let store = Arc::new(FlakyStore::new(2));
        let (promoter, _) = promoter_over(store.clone(), 10_000, Behavior::Succeed);
        let job = create(&store.inner, "lost");

        let dispatch = promoter
            .dispatch(job.clone(), json!({}), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(dispatch, Dispatch::Accepted(_)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let stored = store.get(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        let error = stored.error.unwrap();
        assert_eq!(error.kind, FailureKind::BackendExecution);
        assert!(error.message.contains("database is locked"));
        assert!(promoter.inflight().is_empty());
    }
}
