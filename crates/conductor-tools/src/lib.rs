//! Builtin tools for the agent backend.
//!
//! - **memory**: in-process text store with term-overlap search
//! - **ssh**: allowlist-guarded remote commands (simulated transport)
//! - **catalogue**: every intent the service knows, with safety and routing metadata

pub mod catalogue;
pub mod memory;
pub mod ssh;

pub use catalogue::builtin_registry;
pub use memory::{MemoryBank, MemoryHit, MemoryItem};
pub use ssh::SshPolicy;

use conductor_core::{Error, Result};
use serde::de::DeserializeOwned;

/// Decode capability inputs into a typed argument struct.
pub(crate) fn parse_args<T: DeserializeOwned>(intent: &str, inputs: &serde_json::Value) -> Result<T> {
    serde_json::from_value(inputs.clone())
        .map_err(|e| Error::BackendExecution(format!("Invalid inputs for {}: {}", intent, e)))
}
