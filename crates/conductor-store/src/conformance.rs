//! Behaviour every `JobStore` must share, run against each implementation.

use std::sync::Arc;

use conductor_core::{FailureKind, JobFailure, JobStatus, Mode, NewJob};

use crate::{JobFilter, JobStore, Transition};

pub fn new_job(tag: &str) -> NewJob {
    NewJob {
        id: format!("job_{}", tag),
        fingerprint: format!("fp_{}", tag),
        intent: "memory.write".into(),
        mode: Mode::Agent,
        inputs: serde_json::json!({"text": tag}),
        callback_url: None,
    }
}

pub fn get_or_create_is_idempotent(store: &dyn JobStore) {
    let (first, created) = store.get_or_create(new_job("a")).unwrap();
    assert!(created);
    assert_eq!(first.status, JobStatus::Pending);
    assert!(first.started_at.is_none());

    let (second, created) = store.get_or_create(new_job("a")).unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.inputs, first.inputs);

    let found = store.find_by_fingerprint("fp_a").unwrap().unwrap();
    assert_eq!(found.id, "job_a");
    assert!(store.find_by_fingerprint("fp_missing").unwrap().is_none());
    assert!(store.get("job_missing").unwrap().is_none());
}

pub fn lifecycle_is_monotonic(store: &dyn JobStore) {
    let (job, _) = store.get_or_create(new_job("life")).unwrap();

    // Cannot finish before starting.
    let outcome = store
        .transition(&job.id, Transition::Complete(serde_json::json!(1)))
        .unwrap();
    assert!(!outcome.is_applied());
    assert_eq!(outcome.job().status, JobStatus::Pending);

    assert!(store.transition(&job.id, Transition::Start).unwrap().is_applied());
    assert!(!store.transition(&job.id, Transition::Start).unwrap().is_applied());
    assert!(!store
        .transition(&job.id, Transition::Cancel("late".into()))
        .unwrap()
        .is_applied());

    let done = store
        .transition(&job.id, Transition::Complete(serde_json::json!({"ok": true})))
        .unwrap();
    assert!(done.is_applied());
    let done = done.into_job();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());

    // Terminal: later writes are discarded.
    let late = store
        .transition(
            &job.id,
            Transition::Fail(JobFailure::new(FailureKind::BackendExecution, "late")),
        )
        .unwrap();
    assert!(!late.is_applied());
    let stored = store.get(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.result, Some(serde_json::json!({"ok": true})));
    assert!(stored.error.is_none());

    let (cancelled, _) = store.get_or_create(new_job("cancel")).unwrap();
    let outcome = store
        .transition(&cancelled.id, Transition::Cancel("caller abort".into()))
        .unwrap();
    assert!(outcome.is_applied());
    assert_eq!(outcome.job().status, JobStatus::Cancelled);
    assert!(!store
        .transition(&cancelled.id, Transition::Start)
        .unwrap()
        .is_applied());
}

pub fn transition_unknown_job(store: &dyn JobStore) {
    let err = store.transition("job_nope", Transition::Start).unwrap_err();
    assert!(matches!(err, conductor_core::Error::NotFound(_)));
}

pub fn concurrent_get_or_create<S: JobStore + 'static>(store: Arc<S>) {
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.get_or_create(new_job("race")).unwrap())
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
    assert!(results.iter().all(|(job, _)| job.id == "job_race"));
    assert_eq!(store.counts().unwrap().total, 1);
}

pub fn list_and_counts(store: &dyn JobStore) {
    for tag in ["l1", "l2", "l3"] {
        store.get_or_create(new_job(tag)).unwrap();
    }
    store.transition("job_l2", Transition::Start).unwrap();
    store
        .transition(
            "job_l2",
            Transition::Fail(JobFailure::new(FailureKind::BackendTimeout, "slow")),
        )
        .unwrap();

    let counts = store.counts().unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.total, 3);

    let failed = store
        .list(&JobFilter {
            status: Some(JobStatus::Failed),
            limit: 10,
        })
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "job_l2");
    assert_eq!(
        failed[0].error.as_ref().map(|e| e.kind),
        Some(FailureKind::BackendTimeout)
    );

    let limited = store
        .list(&JobFilter {
            status: None,
            limit: 2,
        })
        .unwrap();
    assert_eq!(limited.len(), 2);
}

pub fn purge_removes_index_entry(store: &dyn JobStore) {
    let (done, _) = store.get_or_create(new_job("old")).unwrap();
    store.transition(&done.id, Transition::Start).unwrap();
    store
        .transition(&done.id, Transition::Complete(serde_json::json!(null)))
        .unwrap();
    let (live, _) = store.get_or_create(new_job("live")).unwrap();

    let purged = store
        .purge_terminal_before(conductor_core::now_millis() + 1_000)
        .unwrap();
    assert_eq!(purged, 1);
    assert!(store.get(&done.id).unwrap().is_none());
    assert!(store.find_by_fingerprint("fp_old").unwrap().is_none());
    assert!(store.get(&live.id).unwrap().is_some());

    // The fingerprint is free again.
    let (_, created) = store.get_or_create(new_job("old")).unwrap();
    assert!(created);
}
