//! Cleanup task — periodic sweep of dead windows from both tiers.
//!
//! DESIGN
//! ======
//! An interval-driven background task, started and stopped by the owning
//! component's lifecycle rather than by module-load side effects. Each run
//! drops expired cache entries and issues one store-side bulk delete. Only
//! entries whose window has already ended are touched, so the sweep is safe
//! against concurrent request traffic.
//!
//! ERROR HANDLING
//! ==============
//! A failed store sweep is logged and retried on the next tick; rows left
//! behind are invisible to the decision path (an expired row never admits a
//! request), they only cost storage.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::env_parse;
use crate::limiter::RateLimiter;
use crate::store::StoreError;
use crate::window::now_ms;

const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;

/// Counts from one cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    /// Expired entries dropped from the cache.
    pub cache_removed: usize,
    /// Expired rows deleted from the store.
    pub store_removed: u64,
}

/// Sweep both tiers once. Also exposed for manual/test invocation.
pub async fn run_cleanup(limiter: &RateLimiter) -> Result<CleanupStats, StoreError> {
    run_cleanup_at(limiter, now_ms()).await
}

pub(crate) async fn run_cleanup_at(limiter: &RateLimiter, now: i64) -> Result<CleanupStats, StoreError> {
    let cache_removed = limiter.cache.sweep_expired(now);
    let store_removed = limiter.store.delete_expired_before(now).await?;
    debug!(cache_removed, store_removed, "cleanup pass finished");
    Ok(CleanupStats { cache_removed, store_removed })
}

/// Handle to the running cleanup task. Dropping it stops the task at the
/// next loop iteration; [`CleanupHandle::shutdown`] additionally waits for
/// an in-flight pass to finish.
pub struct CleanupHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signal the task to stop and wait for the in-flight pass to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "cleanup task did not shut down cleanly");
        }
    }
}

/// Spawn the periodic cleanup task. Interval comes from
/// `RATE_LIMIT_CLEANUP_INTERVAL_MS` (default one minute).
#[must_use]
pub fn spawn_cleanup_task(limiter: RateLimiter) -> CleanupHandle {
    let interval_ms = env_parse("RATE_LIMIT_CLEANUP_INTERVAL_MS", DEFAULT_CLEANUP_INTERVAL_MS);
    spawn_cleanup_task_with_interval(limiter, Duration::from_millis(interval_ms))
}

/// Spawn the cleanup task with an explicit interval.
#[must_use]
pub fn spawn_cleanup_task_with_interval(limiter: RateLimiter, interval: Duration) -> CleanupHandle {
    let (stop, mut stopped) = watch::channel(false);
    info!(interval_ms = interval.as_millis() as u64, "cleanup task configured");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh limiter
        // is not swept before serving anything.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = run_cleanup(&limiter).await {
                        error!(error = %e, "cleanup sweep failed; will retry next tick");
                    }
                }
                _ = stopped.changed() => {
                    info!("cleanup task stopping");
                    break;
                }
            }
        }
    });

    CleanupHandle { stop, task }
}

#[cfg(test)]
#[path = "cleanup_test.rs"]
mod tests;
