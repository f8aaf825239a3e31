//! Deterministic job identity and the idempotency index built on it.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use conductor_core::{Job, Mode, NewJob, Result};
use conductor_store::JobStore;

/// Serialize JSON with object keys sorted and no insignificant whitespace.
///
/// Independent of `serde_json`'s map ordering feature, so the same value
/// always yields the same bytes.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of the canonical `{intent, inputs}` pair. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(intent: &str, inputs: &serde_json::Value) -> Self {
        let payload = serde_json::json!({ "intent": intent, "inputs": inputs });
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(&payload).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Job id derived from the fingerprint (128 bits of the digest).
    pub fn job_id(&self) -> String {
        format!("job_{}", &self.0[..32])
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint → job mapping with atomic get-or-create.
///
/// The index lives in the job store (fingerprint column / map), so an entry
/// exists exactly when the record does.
#[derive(Clone)]
pub struct IdempotencyIndex {
    store: Arc<dyn JobStore>,
}

impl IdempotencyIndex {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Job>> {
        self.store.find_by_fingerprint(fingerprint.as_str())
    }

    /// Returns the job for `fingerprint`, creating it as `pending` if absent.
    /// Exactly one concurrent caller observes `created = true`.
    pub fn get_or_create(
        &self,
        fingerprint: &Fingerprint,
        intent: &str,
        inputs: &serde_json::Value,
        mode: Mode,
        callback_url: Option<String>,
    ) -> Result<(Job, bool)> {
        self.store.get_or_create(NewJob {
            id: fingerprint.job_id(),
            fingerprint: fingerprint.as_str().to_string(),
            intent: intent.to_string(),
            mode,
            inputs: inputs.clone(),
            callback_url,
        })
    }
}
