use async_trait::async_trait;
use serde_json::Value;

use conductor_core::{Error, Mode, Result};

use super::{Backend, Invocation};

/// Model Context Protocol adapter. Not wired to any server yet.
pub struct McpRunner;

#[async_trait]
impl Backend for McpRunner {
    fn mode(&self) -> Mode {
        Mode::Mcp
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<Value> {
        Err(Error::NotImplemented(format!(
            "MCP adapter not implemented (intent: {})",
            invocation.intent
        )))
    }
}
