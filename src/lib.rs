//! Quota enforcement for the Pitchboard API.
//!
//! ARCHITECTURE
//! ============
//! A sliding-window rate limiter with two storage tiers: a process-local
//! [`cache::CounterCache`] answers the hot path, and a shared Postgres
//! counter table (behind the [`store::CounterStore`] trait) arbitrates
//! correctness across running instances. The web layer calls
//! [`RateLimiter::check_and_consume`] per request; a background
//! [`cleanup::spawn_cleanup_task`] sweeps dead windows from both tiers.
//!
//! TRADE-OFFS
//! ==========
//! The cache is best-effort and never trusted over the store: every
//! admitted request is written through, and the store's returned count
//! wins any disagreement. When the store is unreachable the limiter fails
//! open (requests are admitted, flagged degraded) rather than turning an
//! outage into a denial of service — the local cache keeps counting in
//! the meantime, so per-process limits still hold.

pub mod cache;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod limiter;
pub mod store;
pub mod window;

pub use cleanup::{CleanupHandle, CleanupStats, run_cleanup, spawn_cleanup_task};
pub use config::{EndpointCategory, PolicyTable, RateLimitPolicy};
pub use limiter::{Decision, RateLimitInfo, RateLimiter};
pub use store::memory::MemoryCounterStore;
pub use store::postgres::PgCounterStore;
pub use store::{CounterStore, IncrementOutcome, InsertOutcome, StoreError};
pub use window::{CounterKey, WindowEntry};
