//! # Concurrency Gate
//!
//! Owner of the per-flow running counter. Every decision is made with the
//! counter row locked inside a transaction, which makes counter mutation
//! linearizable per flow without any in-process lock: crash recovery and
//! mutual exclusion both come from the backing store.
//!
//! The critical composition is [`ConcurrencyGate::decrement_and_release`]:
//! decrement and queue-pop share one transaction, so two concurrent
//! completions cannot both observe "still at limit" and strand queued work
//! forever.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, instrument, warn};

use crate::database::{keys, store};
use crate::error::{FlowgateError, Result};
use crate::models::{ConcurrencyCounter, FlowDescriptor, QueuedExecution};
use crate::orchestration::{TransactionalConsumer, WaitQueue};

/// Outward admission decision for a start event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionDecision {
    /// Run now; the counter was incremented.
    Run,
    /// Hold in the wait queue; the counter is unchanged.
    Queued,
}

/// Result of a decrement-and-release: the counter after the operation and
/// the queue entry re-admitted by it, if any.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub running: i64,
    pub released: Option<QueuedExecution>,
}

/// Configuration for gate transaction behavior.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Upper bound on counter-row lock waits, in milliseconds. Applied as
    /// `SET LOCAL lock_timeout` so a wedged writer surfaces as a retryable
    /// database error instead of an unbounded stall.
    pub lock_wait_timeout_ms: u64,
    /// Maintenance flag gating [`ConcurrencyGate::update`]. The overwrite
    /// races with in-flight gate transactions and stays disabled outside
    /// manual intervention.
    pub allow_administrative_overwrite: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            lock_wait_timeout_ms: 5000,
            allow_administrative_overwrite: false,
        }
    }
}

#[derive(Clone)]
pub struct ConcurrencyGate {
    pool: PgPool,
    config: GateConfig,
}

impl ConcurrencyGate {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: GateConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: GateConfig) -> Self {
        Self { pool, config }
    }

    /// Decide admit-or-queue for a start event.
    ///
    /// Locks the flow's counter row (creating it first if absent), hands
    /// the current counter to `decision_fn`, persists whatever the closure
    /// left in the counter, commits, and returns the closure's decision.
    /// The closure runs while the row lock is held; an eventual enqueue for
    /// a QUEUED decision belongs to the caller, immediately after.
    #[instrument(skip(self, decision_fn), fields(tenant_id = %flow.tenant_id, flow_id = %flow.flow_id))]
    pub async fn admit_or_queue<D, F>(&self, flow: &FlowDescriptor, decision_fn: F) -> Result<D>
    where
        D: Send,
        F: FnOnce(&mut ConcurrencyCounter) -> D + Send,
    {
        let mut tx = self.begin().await?;

        let mut counter = Self::lock_or_create(&mut tx, flow).await?;
        let decision = decision_fn(&mut counter);
        store::persist(&mut tx, &counter.record_key(), &serde_json::to_value(&counter)?).await?;

        tx.commit().await?;

        debug!(running = counter.running, "Admission decided");
        Ok(decision)
    }

    /// The standard admission decision: admit while under the flow's
    /// limit, queue at or above it. A non-positive limit admits
    /// unconditionally.
    pub async fn try_admit(&self, flow: &FlowDescriptor) -> Result<AdmissionDecision> {
        let limit = flow.concurrency_limit;
        self.admit_or_queue(flow, move |counter| {
            if limit <= 0 || counter.running < limit {
                counter.increment();
                AdmissionDecision::Run
            } else {
                AdmissionDecision::Queued
            }
        })
        .await
    }

    /// Record a completion: decrement the flow's counter, floored at zero.
    /// Returns the new running count.
    #[instrument(skip(self), fields(tenant_id = %flow.tenant_id, flow_id = %flow.flow_id))]
    pub async fn decrement(&self, flow: &FlowDescriptor) -> Result<i64> {
        let mut tx = self.begin().await?;

        let mut counter = Self::lock_or_create(&mut tx, flow).await?;
        let running = counter.decrement_clamped();
        store::persist(&mut tx, &counter.record_key(), &serde_json::to_value(&counter)?).await?;

        tx.commit().await?;

        debug!(running, "Counter decremented");
        Ok(running)
    }

    /// Record a completion and, if capacity opened up, re-admit the oldest
    /// uncontended queued execution in the same transaction.
    ///
    /// The counter row is locked before the queue row, always in that
    /// order. If nothing is poppable the decrement still commits alone.
    /// `on_released` runs inside the transaction; its failure rolls back
    /// decrement and pop together.
    #[instrument(skip(self, wait_queue, on_released), fields(tenant_id = %flow.tenant_id, flow_id = %flow.flow_id))]
    pub async fn decrement_and_release<C>(
        &self,
        flow: &FlowDescriptor,
        wait_queue: &WaitQueue,
        on_released: &C,
    ) -> Result<ReleaseOutcome>
    where
        C: TransactionalConsumer<QueuedExecution> + ?Sized,
    {
        let mut tx = self.begin().await?;

        let mut counter = Self::lock_or_create(&mut tx, flow).await?;
        let mut running = counter.decrement_clamped();
        store::persist(&mut tx, &counter.record_key(), &serde_json::to_value(&counter)?).await?;

        let mut released = None;
        if running < flow.concurrency_limit {
            released = wait_queue
                .pop_in_transaction(
                    &mut tx,
                    &flow.tenant_id,
                    &flow.namespace,
                    &flow.flow_id,
                    on_released,
                )
                .await?;

            if released.is_some() {
                running = self.increment(&mut tx, flow).await?;
            }
        }

        tx.commit().await?;

        if let Some(ref queued) = released {
            info!(
                running,
                execution_id = %queued.execution_id,
                "Released queued execution after completion"
            );
        } else {
            debug!(running, "Counter decremented, nothing to release");
        }

        Ok(ReleaseOutcome { running, released })
    }

    /// Increment the flow's counter within an ongoing transaction whose
    /// counter row is already locked. Used by the release path and by
    /// external re-admission paths. Returns the new running count.
    pub async fn increment(
        &self,
        conn: &mut PgConnection,
        flow: &FlowDescriptor,
    ) -> Result<i64> {
        let mut counter = Self::lock_or_create(conn, flow).await?;
        let running = counter.increment();
        store::persist(conn, &counter.record_key(), &serde_json::to_value(&counter)?).await?;

        Ok(running)
    }

    /// Unlocked, eventually-consistent listing of a tenant's counters.
    /// Corrupt rows are logged and skipped.
    pub async fn find(&self, tenant_id: &str) -> Result<Vec<ConcurrencyCounter>> {
        let prefix = keys::counter_scan_prefix(tenant_id);
        let upper = keys::prefix_upper_bound(&prefix);

        let mut conn = self.pool.acquire().await?;
        let records = store::scan_range(&mut conn, &prefix, &upper).await?;

        let mut counters = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<ConcurrencyCounter>(record.payload) {
                Ok(counter) => counters.push(counter),
                Err(e) => {
                    warn!(record_key = %record.record_key, error = %e, "Skipping corrupt counter row");
                }
            }
        }

        Ok(counters)
    }

    /// Unlocked, eventually-consistent point read of one flow's counter.
    pub async fn find_by_id(
        &self,
        tenant_id: &str,
        namespace: &str,
        flow_id: &str,
    ) -> Result<Option<ConcurrencyCounter>> {
        let key = keys::counter_key(tenant_id, namespace, flow_id);

        let mut conn = self.pool.acquire().await?;
        let record = store::fetch(&mut conn, &key).await?;

        record
            .map(|r| serde_json::from_value(r.payload).map_err(FlowgateError::from))
            .transpose()
    }

    /// Administrative counter overwrite. Unprotected: it does not lock the
    /// row and can race with in-flight gate transactions, so it is refused
    /// unless [`GateConfig::allow_administrative_overwrite`] is set.
    pub async fn update(&self, counter: &ConcurrencyCounter) -> Result<()> {
        if !self.config.allow_administrative_overwrite {
            return Err(FlowgateError::Configuration(
                "Administrative counter overwrite is disabled; enable \
                 allow_administrative_overwrite for maintenance"
                    .to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        store::persist(&mut conn, &counter.record_key(), &serde_json::to_value(counter)?).await?;

        warn!(
            tenant_id = %counter.tenant_id,
            flow_id = %counter.flow_id,
            running = counter.running,
            "Administrative counter overwrite applied"
        );

        Ok(())
    }

    /// Open a gate transaction with the configured lock-wait bound.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.config.lock_wait_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        Ok(tx)
    }

    /// Lock the flow's counter row, creating it first when absent.
    ///
    /// The create-race is tolerated, never surfaced: attempt a
    /// conflict-tolerant insert, then re-read under lock. The re-read
    /// failing after a swallowed conflict means the winning writer's row
    /// disappeared, which normal operation never does.
    async fn lock_or_create(
        conn: &mut PgConnection,
        flow: &FlowDescriptor,
    ) -> Result<ConcurrencyCounter> {
        let key = keys::counter_key(&flow.tenant_id, &flow.namespace, &flow.flow_id);

        if let Some(record) = store::fetch_locked(conn, &key).await? {
            return serde_json::from_value(record.payload).map_err(FlowgateError::from);
        }

        let fresh = ConcurrencyCounter::new(flow);
        let created = store::try_create(conn, &key, &serde_json::to_value(&fresh)?).await?;
        if created {
            debug!(record_key = %key, "Created concurrency counter row");
        }

        match store::fetch_locked(conn, &key).await? {
            Some(record) => serde_json::from_value(record.payload).map_err(FlowgateError::from),
            None => Err(FlowgateError::CounterUnavailable(key)),
        }
    }
}
