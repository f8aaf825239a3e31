//! Orchestration runtime: turns a named intent into a tracked job.
//!
//! Request path: validate → fingerprint → idempotency lookup → mode
//! resolution → safety gate → atomic get-or-create → promoter race between
//! backend execution and the sync deadline → terminal transition → callback.

pub mod backend;
pub mod callback;
pub mod fingerprint;
pub mod maintenance;
pub mod orchestrator;
pub mod promoter;
pub mod registry;
pub mod safety;
pub mod selector;
pub mod signing;
pub mod types;
pub mod validation;

pub use backend::{AgentRunner, Backend, BackendSet, FlowRunner, Invocation, McpRunner};
pub use callback::{CallbackDispatcher, CallbackPayload, CallbackPolicy};
pub use fingerprint::{canonical_json, Fingerprint, IdempotencyIndex};
pub use maintenance::{recover_interrupted, spawn_retention_task, RecoveryReport};
pub use orchestrator::{build_trace, Orchestrator};
pub use promoter::{Dispatch, InFlight, Promoter};
pub use registry::{Capability, DescriptorInfo, IntentDescriptor, IntentPattern, IntentRegistry};
pub use safety::{GateDecision, SafetyGate, CONFIRM_FLAG};
pub use selector::{IntentMatcher, ModeRule, ModeSelector, Resolution};
pub use signing::{HmacSigner, NoopSigner, PayloadSigner};
pub use types::*;
