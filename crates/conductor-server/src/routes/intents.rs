//! Intent catalogue.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/intents", get(list_intents))
}

/// GET /api/intents: registered intents with safety and routing metadata.
async fn list_intents(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let intents = state.orchestrator.registry().list();
    Json(json!({
        "total": intents.len(),
        "intents": intents,
    }))
}
