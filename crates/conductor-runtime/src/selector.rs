//! Mode selector: turns a requested mode into a concrete backend.

use tracing::debug;

use conductor_core::{Error, Mode, RequestedMode, Result, SafetyClass};

use crate::registry::{IntentDescriptor, IntentRegistry};

/// String test applied to an intent name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentMatcher {
    Exact(String),
    Prefix(String),
    Suffix(String),
}

impl IntentMatcher {
    pub fn matches(&self, intent: &str) -> bool {
        match self {
            Self::Exact(s) => intent == s,
            Self::Prefix(p) => intent.starts_with(p.as_str()),
            Self::Suffix(s) => intent.ends_with(s.as_str()),
        }
    }
}

/// One ordered routing rule for `auto` mode.
#[derive(Debug, Clone)]
pub struct ModeRule {
    pub matcher: IntentMatcher,
    pub mode: Mode,
}

impl ModeRule {
    pub fn prefix(prefix: &str, mode: Mode) -> Self {
        Self {
            matcher: IntentMatcher::Prefix(prefix.to_string()),
            mode,
        }
    }

    pub fn suffix(suffix: &str, mode: Mode) -> Self {
        Self {
            matcher: IntentMatcher::Suffix(suffix.to_string()),
            mode,
        }
    }
}

/// Outcome of resolving an intent.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub mode: Mode,
    pub safety: SafetyClass,
    pub descriptor: IntentDescriptor,
}

/// Ordered heuristic rules plus a configured fallback backend.
#[derive(Debug, Clone)]
pub struct ModeSelector {
    rules: Vec<ModeRule>,
    default_mode: Mode,
}

impl ModeSelector {
    /// Builtin rule set: read-only and local operations stay in-process,
    /// integrations go to the workflow engine.
    pub fn new(default_mode: Mode) -> Self {
        let rules = vec![
            ModeRule::suffix(".peek", Mode::Agent),
            ModeRule::suffix(".read", Mode::Agent),
            ModeRule::prefix("memory.", Mode::Agent),
            ModeRule::prefix("gmail.", Mode::Flow),
            ModeRule::prefix("digest.", Mode::Flow),
            ModeRule::prefix("workflow.", Mode::Flow),
            ModeRule::prefix("fs.", Mode::Flow),
            ModeRule::prefix("ssh.", Mode::Agent),
            ModeRule::prefix("mcp.", Mode::Mcp),
        ];
        Self::with_rules(rules, default_mode)
    }

    pub fn with_rules(rules: Vec<ModeRule>, default_mode: Mode) -> Self {
        Self {
            rules,
            default_mode,
        }
    }

    pub fn default_mode(&self) -> Mode {
        self.default_mode
    }

    /// First matching rule, if any.
    pub fn route(&self, intent: &str) -> Option<Mode> {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(intent))
            .map(|r| r.mode)
    }

    /// Resolve `(intent, requested)` into a backend and safety class.
    ///
    /// Unregistered intents fail before any mode logic runs. An explicit mode
    /// always wins; `auto` tries the rules, then the descriptor's default,
    /// then the configured fallback.
    pub fn resolve(
        &self,
        registry: &IntentRegistry,
        intent: &str,
        requested: RequestedMode,
    ) -> Result<Resolution> {
        let descriptor = registry
            .lookup(intent)
            .ok_or_else(|| Error::UnknownIntent(intent.to_string()))?;

        let mode = match requested.explicit() {
            Some(mode) => mode,
            None => {
                let mode = self
                    .route(intent)
                    .or(descriptor.default_mode)
                    .unwrap_or(self.default_mode);
                debug!("Auto-selected mode={} for intent={}", mode, intent);
                mode
            }
        };

        Ok(Resolution {
            mode,
            safety: descriptor.safety,
            descriptor: descriptor.clone(),
        })
    }
}
