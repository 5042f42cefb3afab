//! Postgres implementation of [`CounterStore`].
//!
//! DESIGN
//! ======
//! One row per active key in `rate_limit_counters`. The increment is a
//! single conditional `UPDATE ... WHERE reset_time > now RETURNING`, so two
//! instances racing on the same key serialize at the row and can never both
//! observe a stale count. Every call is bounded by a short deadline; a slow
//! store surfaces as [`StoreError::Timeout`] instead of stalling the
//! caller's request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{CounterStore, IncrementOutcome, InsertOutcome, StoreError};
use crate::config::env_parse;
use crate::window::{CounterKey, WindowEntry};

const DEFAULT_STORE_TIMEOUT_MS: u64 = 50;

/// Durable counter store over a shared Postgres pool.
pub struct PgCounterStore {
    pool: PgPool,
    deadline: Duration,
}

impl PgCounterStore {
    /// Wrap a pool, reading the call deadline from `RATE_LIMIT_STORE_TIMEOUT_MS`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let timeout_ms = env_parse("RATE_LIMIT_STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS);
        Self { pool, deadline: Duration::from_millis(timeout_ms) }
    }

    #[must_use]
    pub fn with_deadline(pool: PgPool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    /// Run a store query under the configured deadline.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn get(&self, key: &CounterKey) -> Result<Option<WindowEntry>, StoreError> {
        let row = self
            .bounded(
                sqlx::query(
                    "SELECT count, reset_time FROM rate_limit_counters
                     WHERE identifier = $1 AND endpoint = $2",
                )
                .bind(&key.identifier)
                .bind(key.endpoint.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|r| WindowEntry { count: r.get("count"), window_reset_at: r.get("reset_time") }))
    }

    async fn increment_if_window_valid(
        &self,
        key: &CounterKey,
        now_ms: i64,
    ) -> Result<IncrementOutcome, StoreError> {
        let row = self
            .bounded(
                sqlx::query(
                    "UPDATE rate_limit_counters
                     SET count = count + 1
                     WHERE identifier = $1 AND endpoint = $2 AND reset_time > $3
                     RETURNING count, reset_time",
                )
                .bind(&key.identifier)
                .bind(key.endpoint.as_str())
                .bind(now_ms)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(match row {
            Some(r) => IncrementOutcome::Incremented(WindowEntry {
                count: r.get("count"),
                window_reset_at: r.get("reset_time"),
            }),
            None => IncrementOutcome::NoValidWindow,
        })
    }

    async fn insert_if_absent(
        &self,
        key: &CounterKey,
        entry: WindowEntry,
        now_ms: i64,
    ) -> Result<InsertOutcome, StoreError> {
        // An expired row under the same key is superseded in the same
        // statement; a live row (concurrent creator won) leaves zero rows
        // affected and the caller retries the increment.
        let result = self
            .bounded(
                sqlx::query(
                    "INSERT INTO rate_limit_counters (identifier, endpoint, count, reset_time)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (identifier, endpoint) DO UPDATE
                     SET count = EXCLUDED.count, reset_time = EXCLUDED.reset_time
                     WHERE rate_limit_counters.reset_time <= $5",
                )
                .bind(&key.identifier)
                .bind(key.endpoint.as_str())
                .bind(entry.count)
                .bind(entry.window_reset_at)
                .bind(now_ms)
                .execute(&self.pool),
            )
            .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn delete(&self, key: &CounterKey) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query("DELETE FROM rate_limit_counters WHERE identifier = $1 AND endpoint = $2")
                .bind(&key.identifier)
                .bind(key.endpoint.as_str())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_expired_before(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM rate_limit_counters WHERE reset_time < $1")
                    .bind(cutoff_ms)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
