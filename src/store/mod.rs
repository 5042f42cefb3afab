//! Durable counter store — the authoritative tier.
//!
//! ARCHITECTURE
//! ============
//! The store is shared by every running instance and is the sole arbiter of
//! how many requests a key has consumed. The trait deliberately exposes a
//! single conditional-increment primitive instead of read/write halves, so
//! no caller can perform an unguarded read-modify-write against it.

use async_trait::async_trait;

use crate::window::{CounterKey, WindowEntry};

pub mod memory;
pub mod postgres;

/// Failure talking to the durable store. Distinct from a quota denial:
/// quota exhaustion is a normal return value, these are infrastructure
/// errors the limiter degrades around.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("counter store call exceeded its deadline")]
    Timeout,
}

/// Result of the conditional increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// A live window existed; its count was incremented. The returned entry
    /// is the post-increment authoritative state.
    Incremented(WindowEntry),
    /// No row, or the row's window has expired — a fresh window must be
    /// created with [`CounterStore::insert_if_absent`].
    NoValidWindow,
}

/// Result of the conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The fresh entry was written (or superseded an expired row).
    Inserted,
    /// A live row already exists — another caller created the window first;
    /// retry the increment against it.
    AlreadyExists,
}

/// Crash-durable counter storage shared across instances.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch the current entry for a key, expired or not.
    async fn get(&self, key: &CounterKey) -> Result<Option<WindowEntry>, StoreError>;

    /// Atomically increment the key's count, but only if its window is
    /// still open at `now_ms`. Serializes concurrent increments on one key.
    async fn increment_if_window_valid(
        &self,
        key: &CounterKey,
        now_ms: i64,
    ) -> Result<IncrementOutcome, StoreError>;

    /// Write a fresh entry unless a live window already exists. An expired
    /// row under the same key is superseded, never extended.
    async fn insert_if_absent(
        &self,
        key: &CounterKey,
        entry: WindowEntry,
        now_ms: i64,
    ) -> Result<InsertOutcome, StoreError>;

    /// Unconditionally delete the key's row.
    async fn delete(&self, key: &CounterKey) -> Result<(), StoreError>;

    /// Delete every row whose window ended before `cutoff_ms`. Returns the
    /// number of rows removed.
    async fn delete_expired_before(&self, cutoff_ms: i64) -> Result<u64, StoreError>;
}
