//! Orchestration entry point.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use conductor_runtime::{OrchestrateRequest, Outcome};

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/orchestrate", post(orchestrate))
}

/// POST /api/orchestrate: run an intent.
///
/// 200 with the sync envelope when the job settles inside the deadline (or
/// for a dry-run preview), 202 with the accepted envelope otherwise. The
/// execution task is detached from this request, so a dropped connection
/// does not cancel it.
async fn orchestrate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrchestrateRequest>,
) -> Response {
    match state.orchestrator.submit(req).await {
        Ok(Outcome::Sync(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Outcome::Accepted(response)) => (StatusCode::ACCEPTED, Json(response)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
