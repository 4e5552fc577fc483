//! # Delay Timer
//!
//! Holding area for executions deferred to a future wall-clock instant.
//! Pollers on any number of processes call [`DelayTimer::get`]
//! concurrently; `FOR UPDATE SKIP LOCKED` over the release-time key range
//! guarantees no entry is released twice.
//!
//! Due-ness is judged against the invoking process's clock, normalized to
//! UTC in the key encoding, so backing-store instances in different
//! timezones agree on ordering.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::database::{keys, store};
use crate::error::Result;
use crate::models::DelayedExecution;
use crate::orchestration::TransactionalConsumer;

/// Configuration for delay timer polling behavior.
#[derive(Debug, Clone)]
pub struct DelayTimerConfig {
    /// Maximum number of due entries released per poll.
    pub batch_size: i64,
}

impl Default for DelayTimerConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

#[derive(Clone)]
pub struct DelayTimer {
    pool: PgPool,
    config: DelayTimerConfig,
}

impl DelayTimer {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: DelayTimerConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: DelayTimerConfig) -> Self {
        Self { pool, config }
    }

    /// Persist a deferred execution, keyed by its release instant.
    /// Idempotent for the same entry.
    pub async fn save(&self, delayed: &DelayedExecution) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let created = store::try_create(
            &mut conn,
            &delayed.record_key(),
            &serde_json::to_value(delayed)?,
        )
        .await?;

        if created {
            debug!(
                execution_id = %delayed.execution_id,
                release_at = %delayed.release_at,
                "Execution deferred"
            );
        }

        Ok(())
    }

    /// Release every uncontended entry due at or before now, up to the
    /// configured batch size. Each entry is handed to the consumer and
    /// deleted inside one transaction; a consumer failure rolls back the
    /// whole batch, releasing nothing.
    ///
    /// Returns the entries released by this call.
    #[instrument(skip(self, consumer))]
    pub async fn get<C>(&self, consumer: &C) -> Result<Vec<DelayedExecution>>
    where
        C: TransactionalConsumer<DelayedExecution> + ?Sized,
    {
        let lo = keys::delayed_scan_prefix();
        let hi = keys::delayed_due_upper_bound(Utc::now());

        let mut tx = self.pool.begin().await?;
        let records =
            store::fetch_range_locked(&mut tx, &lo, &hi, self.config.batch_size).await?;

        let mut released = Vec::with_capacity(records.len());
        for record in records {
            let delayed: DelayedExecution = serde_json::from_value(record.payload)?;
            consumer.consume(&mut tx, &delayed).await?;
            store::delete(&mut tx, &record.record_key).await?;
            released.push(delayed);
        }
        tx.commit().await?;

        if !released.is_empty() {
            debug!(released = released.len(), "Released delayed executions");
        }

        Ok(released)
    }
}
