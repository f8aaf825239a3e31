//! Remote command execution behind host and command allowlists.
//!
//! The transport is simulated: commands are validated and logged, and a
//! synthetic result is returned.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use conductor_core::{Error, Result};

use crate::parse_args;

/// Read-only commands allowed through `ssh.exec.peek`.
pub const SAFE_COMMANDS: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "find", "ps", "top", "df", "du", "free", "uptime",
    "whoami", "hostname", "date", "pwd",
];

const DEFAULT_HOSTS: &str = "localhost,127.0.0.1";

#[derive(Deserialize)]
struct ExecArgs {
    #[serde(default = "default_host")]
    host: String,
    command: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    22
}

#[derive(Debug, Clone)]
pub struct SshPolicy {
    allowed_hosts: Vec<String>,
}

impl SshPolicy {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self { allowed_hosts }
    }

    /// Hosts from `SSH_ALLOWED_HOSTS` (comma separated).
    pub fn from_env() -> Self {
        let raw = std::env::var("SSH_ALLOWED_HOSTS").unwrap_or_else(|_| DEFAULT_HOSTS.to_string());
        Self::new(
            raw.split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
        )
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|h| h == host)
    }

    /// The first word of `command` is an allowlisted read-only program.
    pub fn is_command_safe(command: &str) -> bool {
        command
            .split_whitespace()
            .next()
            .is_some_and(|program| SAFE_COMMANDS.contains(&program))
    }

    fn check_host(&self, host: &str) -> Result<()> {
        if self.is_host_allowed(host) {
            return Ok(());
        }
        warn!("Blocked SSH to non-allowed host: {}", host);
        Err(Error::BackendExecution(format!(
            "Host not allowed: {} (allowed: {}). Add it to SSH_ALLOWED_HOSTS",
            host,
            self.allowed_hosts.join(", ")
        )))
    }

    fn run(&self, args: &ExecArgs) -> serde_json::Value {
        let preview: String = args.command.chars().take(50).collect();
        info!("SSH exec host={} command='{}'", args.host, preview);
        json!({
            "host": args.host,
            "port": args.port,
            "user": args.user,
            "command": args.command,
            "stdout": "",
            "stderr": "",
            "exit_code": 0,
            "simulated": true,
        })
    }

    /// Capability body for `ssh.exec` / `ssh.run`. Confirmation is enforced
    /// by the safety gate before this runs.
    pub fn exec_capability(&self, inputs: &serde_json::Value) -> Result<serde_json::Value> {
        let args: ExecArgs = parse_args("ssh.exec", inputs)?;
        self.check_host(&args.host)?;
        Ok(self.run(&args))
    }

    /// Capability body for `ssh.exec.peek`: read-only commands only.
    pub fn peek_capability(&self, inputs: &serde_json::Value) -> Result<serde_json::Value> {
        let args: ExecArgs = parse_args("ssh.exec.peek", inputs)?;
        self.check_host(&args.host)?;
        if !Self::is_command_safe(&args.command) {
            let program = args.command.split_whitespace().next().unwrap_or_default();
            warn!("Blocked unsafe peek command: {}", args.command);
            return Err(Error::BackendExecution(format!(
                "Command '{}' not allowed in peek mode. Use ssh.exec with confirm_dangerous=true",
                program
            )));
        }
        Ok(self.run(&args))
    }
}
