//! Process-wide TTL cache for completed responses.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::catalog::MedicationItem;

use super::types::GenerationResponse;

/// Short-lived cache of successful generation responses.
///
/// Keyed by the sorted, deduplicated set of item ids: two runs over the
/// same item set share an entry regardless of stock or history inputs.
/// Entries older than the TTL are treated as absent and pruned on read.
/// Writes happen only on fully successful runs.
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (GenerationResponse, Instant)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache key for an item set: sorted unique ids joined with `,`.
    pub fn key(items: &[MedicationItem]) -> String {
        let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.join(",")
    }

    /// A live cached response, if one exists.
    pub async fn get(&self, key: &str) -> Option<GenerationResponse> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((response, stored_at)) if stored_at.elapsed() < self.ttl => {
                    return Some(response.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but expired: prune it.
        let mut entries = self.entries.write().await;
        if let Some((_, stored_at)) = entries.get(key) {
            if stored_at.elapsed() >= self.ttl {
                entries.remove(key);
            }
        }
        None
    }

    pub async fn insert(&self, key: String, response: GenerationResponse) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (response, Instant::now()));
    }

    /// Number of entries, live or expired (for tests and diagnostics).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
