//! HTTP route handlers.

pub mod health;
pub mod intents;
pub mod jobs;
pub mod orchestrate;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use conductor_core::Error;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(health::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(orchestrate::routes())
        .merge(jobs::routes())
        .merge(intents::routes())
}

/// Status code and JSON body for an engine error.
pub(crate) fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        Error::UnknownIntent(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => {
            error!("Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = match &err {
        Error::UnknownIntent(intent) => json!({ "error": err.to_string(), "intent": intent }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, Json(body))
}
