//! # Wait Queue
//!
//! Holding area for executions refused admission by the concurrency gate.
//! Entries are FIFO per flow (enqueue time is part of the record key) and
//! popped one at a time under `FOR UPDATE SKIP LOCKED`, so two concurrent
//! poppers never receive the same entry and never block each other.
//!
//! Under contention a pop may hand out the second-oldest entry while the
//! oldest is momentarily locked elsewhere. That weakening is deliberate:
//! non-blocking throughput over strict ordering.

use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument, warn};

use crate::database::{keys, store};
use crate::error::Result;
use crate::models::QueuedExecution;
use crate::orchestration::TransactionalConsumer;

#[derive(Clone)]
pub struct WaitQueue {
    pool: PgPool,
}

impl WaitQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a queue entry on the caller's connection, so a QUEUED
    /// admission decision and its queue row commit together.
    ///
    /// Inserting the same entry twice is a no-op: the record key is derived
    /// from the entry itself, so blind retries cannot duplicate it.
    pub async fn enqueue_in_transaction(
        &self,
        conn: &mut PgConnection,
        queued: &QueuedExecution,
    ) -> Result<()> {
        let key = queued.record_key();
        let created = store::try_create(conn, &key, &serde_json::to_value(queued)?).await?;

        if created {
            debug!(
                tenant_id = %queued.tenant_id,
                namespace = %queued.namespace,
                flow_id = %queued.flow_id,
                execution_id = %queued.execution_id,
                "Execution enqueued behind concurrency limit"
            );
        } else {
            debug!(execution_id = %queued.execution_id, "Queue entry already present");
        }

        Ok(())
    }

    /// Insert a queue entry in its own transaction.
    pub async fn enqueue(&self, queued: &QueuedExecution) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.enqueue_in_transaction(&mut conn, queued).await
    }

    /// Pop the oldest uncontended entry for one flow on the caller's
    /// transaction. The consumer runs while the row lock is held; the row
    /// is deleted only after the consumer succeeds, so a consumer failure
    /// rolls the pop back and leaves the entry poppable.
    pub async fn pop_in_transaction<C>(
        &self,
        conn: &mut PgConnection,
        tenant_id: &str,
        namespace: &str,
        flow_id: &str,
        consumer: &C,
    ) -> Result<Option<QueuedExecution>>
    where
        C: TransactionalConsumer<QueuedExecution> + ?Sized,
    {
        let prefix = keys::queued_scan_prefix(tenant_id, namespace, flow_id);
        let upper = keys::prefix_upper_bound(&prefix);

        let Some(record) = store::fetch_oldest_locked(conn, &prefix, &upper).await? else {
            return Ok(None);
        };

        let queued: QueuedExecution = serde_json::from_value(record.payload)?;
        consumer.consume(conn, &queued).await?;
        store::delete(conn, &record.record_key).await?;

        debug!(
            tenant_id = %tenant_id,
            namespace = %namespace,
            flow_id = %flow_id,
            execution_id = %queued.execution_id,
            "Popped queued execution"
        );

        Ok(Some(queued))
    }

    /// Pop the oldest uncontended entry for one flow in its own
    /// transaction.
    #[instrument(skip(self, consumer))]
    pub async fn pop<C>(
        &self,
        tenant_id: &str,
        namespace: &str,
        flow_id: &str,
        consumer: &C,
    ) -> Result<Option<QueuedExecution>>
    where
        C: TransactionalConsumer<QueuedExecution> + ?Sized,
    {
        let mut tx = self.pool.begin().await?;
        let popped = self
            .pop_in_transaction(&mut tx, tenant_id, namespace, flow_id, consumer)
            .await?;
        tx.commit().await?;

        Ok(popped)
    }

    /// Best-effort delete for cancellation. Runs in its own transaction;
    /// downstream logic must tolerate "removed without running".
    pub async fn remove(&self, queued: &QueuedExecution) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let removed = store::delete(&mut conn, &queued.record_key()).await?;

        if !removed {
            debug!(execution_id = %queued.execution_id, "Queue entry already gone");
        }

        Ok(removed)
    }

    /// Unlocked administrative listing across all tenants, in key order.
    /// Corrupt rows are logged and skipped rather than failing the listing.
    pub async fn list_all(&self) -> Result<Vec<QueuedExecution>> {
        let prefix = keys::queued_all_prefix();
        let upper = keys::prefix_upper_bound(&prefix);

        let mut conn = self.pool.acquire().await?;
        let records = store::scan_range(&mut conn, &prefix, &upper).await?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<QueuedExecution>(record.payload) {
                Ok(queued) => entries.push(queued),
                Err(e) => {
                    warn!(record_key = %record.record_key, error = %e, "Skipping corrupt queue entry");
                }
            }
        }

        Ok(entries)
    }
}
