//! Process-local counter cache — the fast tier.
//!
//! DESIGN
//! ======
//! A sharded `Mutex<HashMap>` keyed by `(identifier, endpoint)`. Every
//! mutation happens under one shard lock, so the increment-if-valid
//! primitive is atomic within the process and no caller can observe a
//! half-updated entry. The cache has no authority of its own: the limiter
//! overwrites it with the store's answer whenever the store speaks.
//!
//! Reads do not delete expired entries; removal is deferred to the cleanup
//! task so the hot path never pays deletion cost.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use crate::window::{CounterKey, WindowEntry};

const SHARD_COUNT: usize = 16;

/// Outcome of the atomic cache-side increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// No entry, or the cached window has expired — consult the store.
    Miss,
    /// Entry was inside its window and below the limit; count incremented.
    Incremented(WindowEntry),
    /// Entry was inside its window and at/over the limit.
    Exhausted(WindowEntry),
}

/// Concurrency-safe map of live window counters.
pub struct CounterCache {
    shards: [Mutex<HashMap<CounterKey, WindowEntry>>; SHARD_COUNT],
}

impl CounterCache {
    #[must_use]
    pub fn new() -> Self {
        Self { shards: std::array::from_fn(|_| Mutex::new(HashMap::new())) }
    }

    fn shard(&self, key: &CounterKey) -> &Mutex<HashMap<CounterKey, WindowEntry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % SHARD_COUNT;
        &self.shards[idx]
    }

    fn lock_shard(&self, key: &CounterKey) -> std::sync::MutexGuard<'_, HashMap<CounterKey, WindowEntry>> {
        self.shard(key)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Read the current entry for a key, expired or not.
    #[must_use]
    pub fn get(&self, key: &CounterKey) -> Option<WindowEntry> {
        self.lock_shard(key).get(key).copied()
    }

    /// Overwrite the entry for a key with an authoritative value.
    pub fn set(&self, key: &CounterKey, entry: WindowEntry) {
        self.lock_shard(key).insert(key.clone(), entry);
    }

    /// Remove the entry for a key.
    pub fn remove(&self, key: &CounterKey) {
        self.lock_shard(key).remove(key);
    }

    /// Atomically increment the key's count if an entry exists and its
    /// window is still open, refusing once `max` is reached.
    pub fn try_increment(&self, key: &CounterKey, max: i64, now_ms: i64) -> CacheDecision {
        let mut shard = self.lock_shard(key);
        let Some(entry) = shard.get_mut(key) else {
            return CacheDecision::Miss;
        };
        if entry.is_expired(now_ms) {
            return CacheDecision::Miss;
        }
        if entry.count >= max {
            return CacheDecision::Exhausted(*entry);
        }
        entry.count += 1;
        CacheDecision::Incremented(*entry)
    }

    /// Drop every entry whose window ended before `now_ms`. Returns the
    /// number of entries removed. Safe to run concurrently with traffic:
    /// only semantically dead entries are touched.
    pub fn sweep_expired(&self, now_ms: i64) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired(now_ms));
            removed += before - map.len();
        }
        removed
    }

    /// Total live entries across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CounterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
