//! Intent registry: tagged descriptors resolved by exact or prefix match.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use conductor_core::{Mode, Result, SafetyClass};

/// An in-process capability invoked by the agent backend.
///
/// Implementations are synchronous; the agent runner moves them onto the
/// blocking pool.
pub trait Capability: Send + Sync {
    fn call(&self, inputs: &serde_json::Value) -> Result<serde_json::Value>;
}

impl<F> Capability for F
where
    F: Fn(&serde_json::Value) -> Result<serde_json::Value> + Send + Sync,
{
    fn call(&self, inputs: &serde_json::Value) -> Result<serde_json::Value> {
        self(inputs)
    }
}

/// How a descriptor matches intent strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentPattern {
    Exact(String),
    /// Matches any intent starting with the prefix (e.g. `workflow.`).
    Prefix(String),
}

impl IntentPattern {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(s) | Self::Prefix(s) => s,
        }
    }
}

/// Registry entry for one intent or intent family.
#[derive(Clone)]
pub struct IntentDescriptor {
    pub pattern: IntentPattern,
    pub capability: Option<Arc<dyn Capability>>,
    pub safety: SafetyClass,
    pub default_mode: Option<Mode>,
    pub required_inputs: Vec<String>,
    pub description: String,
    /// Extra guidance included in dry-run previews.
    pub preview_hint: Option<String>,
}

impl IntentDescriptor {
    fn with_pattern(pattern: IntentPattern) -> Self {
        Self {
            pattern,
            capability: None,
            safety: SafetyClass::Safe,
            default_mode: None,
            required_inputs: Vec::new(),
            description: String::new(),
            preview_hint: None,
        }
    }

    pub fn exact(intent: impl Into<String>) -> Self {
        Self::with_pattern(IntentPattern::Exact(intent.into()))
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::with_pattern(IntentPattern::Prefix(prefix.into()))
    }

    pub fn capability(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn dangerous(mut self) -> Self {
        self.safety = SafetyClass::Dangerous;
        self
    }

    pub fn default_mode(mut self, mode: Mode) -> Self {
        self.default_mode = Some(mode);
        self
    }

    pub fn requires(mut self, keys: &[&str]) -> Self {
        self.required_inputs = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.preview_hint = Some(hint.into());
        self
    }

    pub fn info(&self) -> DescriptorInfo {
        DescriptorInfo {
            intent: self.pattern.as_str().to_string(),
            prefix: matches!(self.pattern, IntentPattern::Prefix(_)),
            safety: self.safety,
            default_mode: self.default_mode,
            in_process: self.capability.is_some(),
            required_inputs: self.required_inputs.clone(),
            description: self.description.clone(),
        }
    }
}

impl std::fmt::Debug for IntentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentDescriptor")
            .field("pattern", &self.pattern)
            .field("capability", &self.capability.is_some())
            .field("safety", &self.safety)
            .field("default_mode", &self.default_mode)
            .finish()
    }
}

/// Serializable view of a descriptor for the catalogue endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorInfo {
    pub intent: String,
    pub prefix: bool,
    pub safety: SafetyClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<Mode>,
    pub in_process: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_inputs: Vec<String>,
    pub description: String,
}

/// Static intent table. Built once at startup, then shared read-only.
#[derive(Default)]
pub struct IntentRegistry {
    exact: HashMap<String, IntentDescriptor>,
    /// Longest prefix first.
    prefixes: Vec<IntentDescriptor>,
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a descriptor.
    pub fn register(&mut self, descriptor: IntentDescriptor) {
        match &descriptor.pattern {
            IntentPattern::Exact(intent) => {
                self.exact.insert(intent.clone(), descriptor);
            }
            IntentPattern::Prefix(prefix) => {
                let prefix = prefix.clone();
                self.prefixes.retain(|d| d.pattern.as_str() != prefix);
                self.prefixes.push(descriptor);
                self.prefixes
                    .sort_by(|a, b| b.pattern.as_str().len().cmp(&a.pattern.as_str().len()));
            }
        }
    }

    /// Exact match first, then the longest matching prefix.
    pub fn lookup(&self, intent: &str) -> Option<&IntentDescriptor> {
        self.exact.get(intent).or_else(|| {
            self.prefixes
                .iter()
                .find(|d| intent.starts_with(d.pattern.as_str()))
        })
    }

    pub fn contains(&self, intent: &str) -> bool {
        self.lookup(intent).is_some()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All descriptors, sorted by intent.
    pub fn list(&self) -> Vec<DescriptorInfo> {
        let mut infos: Vec<DescriptorInfo> = self
            .exact
            .values()
            .chain(self.prefixes.iter())
            .map(IntentDescriptor::info)
            .collect();
        infos.sort_by(|a, b| a.intent.cmp(&b.intent));
        infos
    }
}
