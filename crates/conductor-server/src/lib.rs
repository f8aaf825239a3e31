//! Conductor HTTP service.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{open_store, AppState};
