//! Integration tests for the wait queue: FIFO ordering, at-most-once pop
//! across concurrent poppers, consumer-failure rollback, and the
//! administrative surfaces.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowgate_core::error::FlowgateError;
use flowgate_core::models::QueuedExecution;
use flowgate_core::orchestration::{TransactionalConsumer, WaitQueue};
use flowgate_core::Result;
use serde_json::json;
use sqlx::PgConnection;

struct Collector {
    seen: Mutex<Vec<QueuedExecution>>,
}

impl Collector {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TransactionalConsumer<QueuedExecution> for Collector {
    async fn consume(&self, _conn: &mut PgConnection, item: &QueuedExecution) -> Result<()> {
        self.seen.lock().unwrap().push(item.clone());
        Ok(())
    }
}

/// A consumer that always fails, to prove pops roll back.
struct FailingConsumer;

#[async_trait]
impl TransactionalConsumer<QueuedExecution> for FailingConsumer {
    async fn consume(&self, _conn: &mut PgConnection, _item: &QueuedExecution) -> Result<()> {
        Err(FlowgateError::Configuration("consumer exploded".to_string()))
    }
}

/// Enqueue entries with strictly increasing enqueue timestamps.
async fn enqueue_sequence(
    queue: &WaitQueue,
    flow: &flowgate_core::models::FlowDescriptor,
    ids: &[&str],
) {
    let mut base = chrono::Utc::now();
    for id in ids {
        let mut queued = QueuedExecution::new(flow, *id, json!({"id": *id}));
        queued.enqueued_at = base;
        queue.enqueue(&queued).await.expect("enqueue failed");
        base += chrono::Duration::microseconds(10);
    }
}

#[tokio::test]
async fn test_pop_returns_entries_in_enqueue_order() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let queue = WaitQueue::new(pool);
    let flow = common::unique_flow(1);

    enqueue_sequence(&queue, &flow, &["exec-a", "exec-b", "exec-c"]).await;

    let collector = Collector::new();
    let mut popped_ids = Vec::new();
    while let Some(popped) = queue
        .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, collector.as_ref())
        .await
        .unwrap()
    {
        popped_ids.push(popped.execution_id);
    }

    assert_eq!(popped_ids, vec!["exec-a", "exec-b", "exec-c"]);
}

#[tokio::test]
async fn test_pop_on_empty_queue_is_a_noop() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let queue = WaitQueue::new(pool);
    let flow = common::unique_flow(1);

    let collector = Collector::new();
    let popped = queue
        .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, collector.as_ref())
        .await
        .unwrap();

    assert!(popped.is_none());
    assert!(collector.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_consumer_failure_rolls_back_the_pop() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let queue = WaitQueue::new(pool);
    let flow = common::unique_flow(1);

    let queued = QueuedExecution::new(&flow, "exec-1", json!({"state": "CREATED"}));
    queue.enqueue(&queued).await.unwrap();

    let result = queue
        .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, &FailingConsumer)
        .await;
    assert!(result.is_err());

    // The entry survived the failed hand-off and is poppable again.
    let collector = Collector::new();
    let popped = queue
        .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, collector.as_ref())
        .await
        .unwrap()
        .expect("entry should still be present");
    assert_eq!(popped.execution_id, "exec-1");
}

#[tokio::test]
async fn test_enqueue_is_idempotent_for_same_entry() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let queue = WaitQueue::new(pool);
    let flow = common::unique_flow(1);

    let queued = QueuedExecution::new(&flow, "exec-1", json!({}));
    queue.enqueue(&queued).await.unwrap();
    // Blind retry after an ambiguous failure.
    queue.enqueue(&queued).await.unwrap();

    let collector = Collector::new();
    let mut count = 0;
    while queue
        .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, collector.as_ref())
        .await
        .unwrap()
        .is_some()
    {
        count += 1;
    }
    assert_eq!(count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_pops_hand_out_each_entry_once() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let queue = WaitQueue::new(pool.clone());
    let flow = common::unique_flow(1);

    enqueue_sequence(&queue, &flow, &["e-0", "e-1", "e-2", "e-3", "e-4"]).await;

    let collector = Collector::new();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = WaitQueue::new(pool.clone());
        let flow = flow.clone();
        let collector = Arc::clone(&collector);
        handles.push(tokio::spawn(async move {
            queue
                .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, collector.as_ref())
                .await
        }));
    }

    let mut popped = Vec::new();
    for joined in futures::future::join_all(handles).await {
        if let Some(entry) = joined.unwrap().expect("pop failed") {
            popped.push(entry.execution_id);
        }
    }

    // No entry was handed to two callers.
    let mut deduped = popped.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), popped.len());

    // And none were lost: the rest are still poppable.
    let mut remaining = 0;
    while queue
        .pop(&flow.tenant_id, &flow.namespace, &flow.flow_id, collector.as_ref())
        .await
        .unwrap()
        .is_some()
    {
        remaining += 1;
    }
    assert_eq!(popped.len() + remaining, 5);
}

#[tokio::test]
async fn test_remove_is_best_effort() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let queue = WaitQueue::new(pool);
    let flow = common::unique_flow(1);

    let queued = QueuedExecution::new(&flow, "exec-1", json!({}));
    queue.enqueue(&queued).await.unwrap();

    assert!(queue.remove(&queued).await.unwrap());
    // Removing again reports "already gone" without failing.
    assert!(!queue.remove(&queued).await.unwrap());
}

#[tokio::test]
async fn test_list_all_spans_tenants() -> anyhow::Result<()> {
    let Some(pool) = common::try_test_pool().await else {
        return Ok(());
    };
    let queue = WaitQueue::new(pool);
    let flow = common::unique_flow(1);

    let queued = QueuedExecution::new(&flow, "exec-list", json!({}));
    queue.enqueue(&queued).await?;

    let listed = queue.list_all().await?;
    assert!(listed.iter().any(|q| q.execution_id == "exec-list" && q.flow_id == flow.flow_id));

    queue.remove(&queued).await?;

    Ok(())
}
