//! In-memory implementation of [`CounterStore`].
//!
//! Backs the test suite and single-instance deployments that run without
//! Postgres. Semantics match the SQL adapter exactly, including the
//! supersede-expired-row behavior of `insert_if_absent`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CounterStore, IncrementOutcome, InsertOutcome, StoreError};
use crate::window::{CounterKey, WindowEntry};

/// Process-local durable-store stand-in. One `Mutex<HashMap>` — each trait
/// call is a single critical section, mirroring the row-level atomicity the
/// SQL adapter gets from conditional UPDATEs.
pub struct MemoryCounterStore {
    rows: Mutex<HashMap<CounterKey, WindowEntry>>,
}

impl MemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CounterKey, WindowEntry>> {
        self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of rows currently held, expired or not.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &CounterKey) -> Result<Option<WindowEntry>, StoreError> {
        Ok(self.lock().get(key).copied())
    }

    async fn increment_if_window_valid(
        &self,
        key: &CounterKey,
        now_ms: i64,
    ) -> Result<IncrementOutcome, StoreError> {
        let mut rows = self.lock();
        match rows.get_mut(key) {
            Some(entry) if !entry.is_expired(now_ms) => {
                entry.count += 1;
                Ok(IncrementOutcome::Incremented(*entry))
            }
            _ => Ok(IncrementOutcome::NoValidWindow),
        }
    }

    async fn insert_if_absent(
        &self,
        key: &CounterKey,
        entry: WindowEntry,
        now_ms: i64,
    ) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.lock();
        match rows.get(key) {
            Some(existing) if !existing.is_expired(now_ms) => Ok(InsertOutcome::AlreadyExists),
            _ => {
                rows.insert(key.clone(), entry);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn delete(&self, key: &CounterKey) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn delete_expired_before(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|_, entry| entry.window_reset_at >= cutoff_ms);
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
