use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::keys;
use crate::models::FlowDescriptor;

/// An execution refused admission and parked in the wait queue.
///
/// The payload is the serialized execution record and is never interpreted
/// here. Rows are FIFO-ordered per flow by `enqueued_at` (key-encoded, so
/// ordering is a property of the key itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedExecution {
    pub tenant_id: String,
    pub namespace: String,
    pub flow_id: String,
    pub execution_id: String,
    pub enqueued_at: DateTime<Utc>,
    pub execution: Value,
}

impl QueuedExecution {
    /// Queue entry for an execution of `flow`, stamped with the current
    /// UTC instant. Re-enqueueing the same value after a failed commit
    /// reuses the same key, keeping blind retries idempotent.
    pub fn new(flow: &FlowDescriptor, execution_id: impl Into<String>, execution: Value) -> Self {
        Self {
            tenant_id: flow.tenant_id.clone(),
            namespace: flow.namespace.clone(),
            flow_id: flow.flow_id.clone(),
            execution_id: execution_id.into(),
            enqueued_at: Utc::now(),
            execution,
        }
    }

    pub fn record_key(&self) -> String {
        keys::queued_key(
            &self.tenant_id,
            &self.namespace,
            &self.flow_id,
            self.enqueued_at,
            &self.execution_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key_orders_by_enqueue_time() {
        let flow = FlowDescriptor::new("acme", "prod", "nightly-etl", 1);
        let first = QueuedExecution::new(&flow, "exec-b", json!({"seq": 1}));
        let mut second = QueuedExecution::new(&flow, "exec-a", json!({"seq": 2}));
        second.enqueued_at = first.enqueued_at + chrono::Duration::microseconds(1);

        assert!(first.record_key() < second.record_key());
    }

    #[test]
    fn test_payload_round_trips_opaque() {
        let flow = FlowDescriptor::new("acme", "prod", "nightly-etl", 1);
        let queued = QueuedExecution::new(&flow, "exec-1", json!({"state": "CREATED"}));

        let value = serde_json::to_value(&queued).unwrap();
        let back: QueuedExecution = serde_json::from_value(value).unwrap();
        assert_eq!(back, queued);
    }
}
