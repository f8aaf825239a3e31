//! The builtin intent catalogue.

use std::sync::Arc;

use serde_json::Value;

use conductor_core::{Mode, Result};
use conductor_runtime::{IntentDescriptor, IntentRegistry};

use crate::memory::MemoryBank;
use crate::ssh::SshPolicy;

const SSH_HINT: &str = "Use ssh.exec.peek for read-only operations";

/// Every intent the service accepts.
///
/// In-process intents get capabilities bound to `memory` and `ssh`;
/// workflow intents carry routing metadata only.
pub fn builtin_registry(memory: Arc<MemoryBank>, ssh: Arc<SshPolicy>) -> IntentRegistry {
    let mut registry = IntentRegistry::new();

    for intent in ["memory.write", "memory.store"] {
        let bank = memory.clone();
        registry.register(
            IntentDescriptor::exact(intent)
                .requires(&["text"])
                .describe("Store a text item with optional tags")
                .capability(Arc::new(move |inputs: &Value| -> Result<Value> {
                    bank.store_capability(inputs)
                })),
        );
    }
    for intent in ["memory.search", "memory.query"] {
        let bank = memory.clone();
        registry.register(
            IntentDescriptor::exact(intent)
                .requires(&["query"])
                .describe("Search stored items by term overlap")
                .capability(Arc::new(move |inputs: &Value| -> Result<Value> {
                    bank.search_capability(inputs)
                })),
        );
    }

    for intent in ["ssh.exec", "ssh.run"] {
        let policy = ssh.clone();
        registry.register(
            IntentDescriptor::exact(intent)
                .dangerous()
                .requires(&["command"])
                .hint(SSH_HINT)
                .describe("Run a command on an allowlisted host")
                .capability(Arc::new(move |inputs: &Value| -> Result<Value> {
                    policy.exec_capability(inputs)
                })),
        );
    }
    let policy = ssh;
    registry.register(
        IntentDescriptor::exact("ssh.exec.peek")
            .requires(&["command"])
            .describe("Run a read-only command on an allowlisted host")
            .capability(Arc::new(move |inputs: &Value| -> Result<Value> {
                policy.peek_capability(inputs)
            })),
    );

    registry.register(
        IntentDescriptor::exact("gmail.triage")
            .default_mode(Mode::Flow)
            .describe("Search and label mail through the triage workflow"),
    );
    registry.register(
        IntentDescriptor::exact("gmail.send")
            .dangerous()
            .default_mode(Mode::Flow)
            .describe("Send mail through the workflow engine"),
    );
    registry.register(
        IntentDescriptor::exact("digest.daily")
            .default_mode(Mode::Flow)
            .describe("Build the daily digest"),
    );
    registry.register(
        IntentDescriptor::exact("fs.analyze")
            .default_mode(Mode::Flow)
            .describe("Analyze a directory tree"),
    );
    registry.register(
        IntentDescriptor::prefix("workflow.")
            .default_mode(Mode::Flow)
            .describe("Any named workflow"),
    );
    registry.register(
        IntentDescriptor::prefix("mcp.")
            .default_mode(Mode::Mcp)
            .describe("Model Context Protocol tools"),
    );

    registry
}
