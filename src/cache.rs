//! In-memory query cache.
//!
//! TTL plus capacity bounded, keyed by a digest of
//! `(query, strategy, limit)`. Purely an ephemeral engine-side
//! accelerator: the engine owns no persisted state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::config::{CacheConfig, Strategy};
use crate::model::RetrievalResult;

/// Digest key for one `(query, strategy, limit)` combination.
#[must_use]
pub fn cache_key(query: &str, strategy: Strategy, limit: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update([0x1f]);
    hasher.update(strategy.as_str().as_bytes());
    hasher.update([0x1f]);
    hasher.update(limit.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    results: Vec<RetrievalResult>,
    inserted_at: Instant,
}

/// Bounded TTL cache over fused result lists.
pub struct QueryCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh entry; expired entries are dropped on access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<RetrievalResult>> {
        if !self.config.enabled {
            return None;
        }
        let ttl = Duration::from_millis(self.config.ttl_ms);
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= ttl => Some(entry.results.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert, evicting the oldest entry when at capacity.
    pub fn insert(&self, key: String, results: Vec<RetrievalResult>) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.config.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                results,
                inserted_at: Instant::now(),
            },
        );
    }
}
