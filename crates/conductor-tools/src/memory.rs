//! Memory bank: stores short texts with tags and finds them again by term overlap.

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use conductor_core::{now_millis, Result};

use crate::parse_args;

const DEFAULT_K: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub item_id: String,
    pub text: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    pub stored_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryHit {
    #[serde(flatten)]
    pub item: MemoryItem,
    /// Fraction of query terms found in the item.
    pub score: f64,
}

#[derive(Deserialize)]
struct StoreArgs {
    text: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    speaker_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Lowercased alphanumeric terms.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[derive(Default)]
pub struct MemoryBank {
    items: RwLock<Vec<MemoryItem>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, text: &str, tags: Vec<String>, speaker_id: Option<String>) -> MemoryItem {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let item = MemoryItem {
            item_id: format!("mem_{}", &id[..12]),
            text: text.to_string(),
            tags,
            speaker_id,
            stored_at: now_millis(),
        };
        self.items.write().push(item.clone());
        info!("Stored memory {} ({} chars)", item.item_id, text.len());
        item
    }

    /// Top `k` items by term overlap, newest first among equal scores.
    /// Items must carry every tag in `tags`.
    pub fn search(&self, query: &str, k: usize, tags: &[String]) -> Vec<MemoryHit> {
        let wanted = terms(query);
        if wanted.is_empty() || k == 0 {
            return Vec::new();
        }

        let items = self.items.read();
        let mut hits: Vec<MemoryHit> = items
            .iter()
            .filter(|item| tags.iter().all(|t| item.tags.contains(t)))
            .filter_map(|item| {
                let have = terms(&item.text);
                let matched = wanted.iter().filter(|t| have.contains(*t)).count();
                (matched > 0).then(|| MemoryHit {
                    item: item.clone(),
                    score: matched as f64 / wanted.len() as f64,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.item.stored_at.cmp(&a.item.stored_at))
        });
        hits.truncate(k);
        debug!("Memory search '{}' -> {} hits", query, hits.len());
        hits
    }

    /// Capability body for `memory.write` / `memory.store`.
    pub fn store_capability(&self, inputs: &serde_json::Value) -> Result<serde_json::Value> {
        let args: StoreArgs = parse_args("memory.write", inputs)?;
        let item = self.insert(&args.text, args.tags, args.speaker_id);
        Ok(json!({
            "item_id": item.item_id,
            "status": "stored",
            "text_length": item.text.chars().count(),
            "tags": item.tags,
        }))
    }

    /// Capability body for `memory.search` / `memory.query`.
    pub fn search_capability(&self, inputs: &serde_json::Value) -> Result<serde_json::Value> {
        let args: SearchArgs = parse_args("memory.search", inputs)?;
        let hits = self.search(&args.query, args.k.unwrap_or(DEFAULT_K), &args.tags);
        Ok(json!({
            "query": args.query,
            "count": hits.len(),
            "results": hits,
        }))
    }
}
