//! Job query routes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use conductor_core::{Error, JobStatus};
use conductor_runtime::JobView;
use conductor_store::JobFilter;

use super::error_response;
use crate::state::AppState;

const MAX_LIMIT: usize = 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/stats", get(job_stats))
        .route("/jobs/{job_id}", get(get_job))
        .route("/jobs/{job_id}/cancel", post(cancel_job))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    limit: Option<usize>,
}

/// GET /api/jobs: newest first, optionally filtered by status.
async fn list_jobs(State(state): State<Arc<AppState>>, Query(query): Query<ListQuery>) -> Response {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match JobStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(Error::Validation(format!("unknown status '{}'", raw)))
                    .into_response()
            }
        },
    };
    let filter = JobFilter {
        status,
        limit: query
            .limit
            .unwrap_or(JobFilter::default().limit)
            .clamp(1, MAX_LIMIT),
    };

    match state.orchestrator.list(&filter) {
        Ok(jobs) => {
            let jobs: Vec<JobView> = jobs.into_iter().map(JobView::from).collect();
            Json(json!({
                "total": jobs.len(),
                "jobs": jobs,
            }))
            .into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /api/jobs/stats: job counts by status.
async fn job_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.counts() {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /api/jobs/:job_id: single job.
async fn get_job(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    match state.orchestrator.job(&job_id) {
        Ok(Some(job)) => (StatusCode::OK, Json(JobView::from(job))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /api/jobs/:job_id/cancel: cancel a job that has not started.
async fn cancel_job(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    match state.orchestrator.cancel(&job_id) {
        Ok(outcome) => {
            let cancelled = outcome.is_applied();
            Json(json!({
                "cancelled": cancelled,
                "job": JobView::from(outcome.into_job()),
            }))
            .into_response()
        }
        Err(Error::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
