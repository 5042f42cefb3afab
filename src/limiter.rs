//! Rate limiter orchestration over the two storage tiers.
//!
//! DESIGN
//! ======
//! Per request: resolve the category's policy, try the process-local cache,
//! then let the durable store arbitrate. The store's conditional increment
//! is the only authority on the count; whatever it returns overwrites the
//! cache before a decision goes out. The cache contributes two things: a
//! fast deny once a window is known-exhausted, and best-effort local
//! counting while the store is down.
//!
//! ERROR HANDLING
//! ==============
//! Quota exhaustion is a normal `Decision`, never an `Err`. Store failures
//! fail open: the request is admitted, the decision is marked `degraded`,
//! and a warning is logged — an infrastructure outage must not become a
//! denial of service against legitimate traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::cache::{CacheDecision, CounterCache};
use crate::config::{EndpointCategory, PolicyTable, RateLimitPolicy};
use crate::store::memory::MemoryCounterStore;
use crate::store::postgres::PgCounterStore;
use crate::store::{CounterStore, IncrementOutcome, InsertOutcome, StoreError};
use crate::window::{CounterKey, WindowEntry, now_ms};

// =============================================================================
// DECISION TYPES
// =============================================================================

/// Outcome of [`RateLimiter::check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: i64,
    /// Unix-millis timestamp at which the window resets.
    pub window_reset_at: i64,
    /// True when the durable store could not be consulted and the limiter
    /// failed open. Distinct from a denial.
    pub degraded: bool,
}

/// Advisory quota snapshot from [`RateLimiter::peek`]. Feeds response
/// headers without consuming quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    /// The category's request budget per window.
    pub limit: i64,
    /// Requests left in the current window.
    pub remaining: i64,
    /// When the current window resets; `None` when no window is open.
    pub window_reset_at: Option<i64>,
    /// True when the snapshot could not be confirmed against the store.
    pub degraded: bool,
}

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Sliding-window quota enforcement, shared across request handlers.
/// Clone is cheap: both tiers live behind `Arc`.
#[derive(Clone)]
pub struct RateLimiter {
    pub(crate) cache: Arc<CounterCache>,
    pub(crate) store: Arc<dyn CounterStore>,
    policies: PolicyTable,
    degraded: Arc<AtomicBool>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, policies: PolicyTable) -> Self {
        Self {
            cache: Arc::new(CounterCache::new()),
            store,
            policies,
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Limiter backed by the shared Postgres counter table. The normal
    /// multi-instance deployment.
    #[must_use]
    pub fn with_postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgCounterStore::new(pool)), PolicyTable::from_env())
    }

    /// Limiter backed by an in-process store. For tests and single-instance
    /// deployments without Postgres.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()), PolicyTable::from_env())
    }

    /// Whether the last store interaction failed (limiter is failing open).
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn policy(&self, endpoint: EndpointCategory) -> RateLimitPolicy {
        self.policies.get(endpoint)
    }

    // -------------------------------------------------------------------------
    // check_and_consume
    // -------------------------------------------------------------------------

    /// Decide whether one request for `identifier` against `endpoint` is
    /// admitted, consuming quota if so.
    pub async fn check_and_consume(&self, identifier: &str, endpoint: EndpointCategory) -> Decision {
        self.check_and_consume_at(identifier, endpoint, now_ms()).await
    }

    /// Internal: decision with explicit timestamp (for testing).
    pub(crate) async fn check_and_consume_at(
        &self,
        identifier: &str,
        endpoint: EndpointCategory,
        now: i64,
    ) -> Decision {
        let policy = self.policies.get(endpoint);
        let max = policy.max_requests;
        let key = CounterKey::new(identifier, endpoint);

        // TIER 1: the cache answers exhaustion without a store round-trip,
        // and pre-counts an admit that the store will confirm below.
        let cached = match self.cache.try_increment(&key, max, now) {
            CacheDecision::Exhausted(entry) => {
                debug!(identifier = %key.identifier, endpoint = %endpoint, "denied from cache");
                return Decision {
                    allowed: false,
                    remaining: 0,
                    window_reset_at: entry.window_reset_at,
                    degraded: false,
                };
            }
            CacheDecision::Incremented(entry) => Some(entry),
            CacheDecision::Miss => None,
        };

        // TIER 2: the store arbitrates; its row overwrites the cache.
        match self.consume_from_store(&key, policy, now).await {
            Ok(entry) => {
                self.note_store_ok();
                self.cache.set(&key, entry);
                if entry.count > max {
                    Decision { allowed: false, remaining: 0, window_reset_at: entry.window_reset_at, degraded: false }
                } else {
                    Decision {
                        allowed: true,
                        remaining: max - entry.count,
                        window_reset_at: entry.window_reset_at,
                        degraded: false,
                    }
                }
            }
            Err(e) => {
                self.note_store_failure(&key, &e);
                // Fail open, but keep the local count honest so this
                // process still enforces the limit during the outage.
                let entry = match cached {
                    Some(entry) => entry,
                    None => {
                        let fresh = WindowEntry::fresh(now, policy.window_ms);
                        self.cache.set(&key, fresh);
                        fresh
                    }
                };
                Decision {
                    allowed: true,
                    remaining: (max - entry.count).max(0),
                    window_reset_at: entry.window_reset_at,
                    degraded: true,
                }
            }
        }
    }

    /// Run the store-side consume: increment the live window, or create a
    /// fresh one. Two passes cover the create/increment race with a
    /// concurrent instance.
    async fn consume_from_store(
        &self,
        key: &CounterKey,
        policy: RateLimitPolicy,
        now: i64,
    ) -> Result<WindowEntry, StoreError> {
        for _ in 0..2 {
            if let IncrementOutcome::Incremented(entry) =
                self.store.increment_if_window_valid(key, now).await?
            {
                return Ok(entry);
            }

            let fresh = WindowEntry::fresh(now, policy.window_ms);
            match self.store.insert_if_absent(key, fresh, now).await? {
                InsertOutcome::Inserted => return Ok(fresh),
                // Lost the creation race; loop back and increment the
                // winner's window.
                InsertOutcome::AlreadyExists => {}
            }
        }

        // Both passes lost both races: a window expired between our insert
        // attempt and retry, twice. Treat as unavailability.
        warn!(identifier = %key.identifier, endpoint = %key.endpoint, "store consume retries exhausted");
        Err(StoreError::Timeout)
    }

    // -------------------------------------------------------------------------
    // peek
    // -------------------------------------------------------------------------

    /// Read-only quota snapshot. Never consumes quota or mutates counts.
    pub async fn peek(&self, identifier: &str, endpoint: EndpointCategory) -> RateLimitInfo {
        self.peek_at(identifier, endpoint, now_ms()).await
    }

    pub(crate) async fn peek_at(&self, identifier: &str, endpoint: EndpointCategory, now: i64) -> RateLimitInfo {
        let policy = self.policies.get(endpoint);
        let max = policy.max_requests;
        let key = CounterKey::new(identifier, endpoint);

        if let Some(entry) = self.cache.get(&key) {
            if !entry.is_expired(now) {
                return RateLimitInfo {
                    limit: max,
                    remaining: (max - entry.count).max(0),
                    window_reset_at: Some(entry.window_reset_at),
                    degraded: false,
                };
            }
        }

        match self.store.get(&key).await {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                self.note_store_ok();
                self.cache.set(&key, entry);
                RateLimitInfo {
                    limit: max,
                    remaining: (max - entry.count).max(0),
                    window_reset_at: Some(entry.window_reset_at),
                    degraded: false,
                }
            }
            Ok(_) => {
                self.note_store_ok();
                RateLimitInfo { limit: max, remaining: max, window_reset_at: None, degraded: false }
            }
            Err(e) => {
                self.note_store_failure(&key, &e);
                RateLimitInfo { limit: max, remaining: max, window_reset_at: None, degraded: true }
            }
        }
    }

    // -------------------------------------------------------------------------
    // reset
    // -------------------------------------------------------------------------

    /// Delete the key from both tiers unconditionally. Administrative/test
    /// path, not part of request handling.
    pub async fn reset(&self, identifier: &str, endpoint: EndpointCategory) -> Result<(), StoreError> {
        let key = CounterKey::new(identifier, endpoint);
        self.cache.remove(&key);
        self.store.delete(&key).await?;
        self.note_store_ok();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // degraded-mode bookkeeping
    // -------------------------------------------------------------------------

    fn note_store_ok(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            tracing::info!("counter store reachable again; degraded mode cleared");
        }
    }

    fn note_store_failure(&self, key: &CounterKey, error: &StoreError) {
        self.degraded.store(true, Ordering::Relaxed);
        warn!(
            error = %error,
            identifier = %key.identifier,
            endpoint = %key.endpoint,
            "counter store unavailable; failing open"
        );
    }
}

#[cfg(test)]
#[path = "limiter_test.rs"]
mod tests;
