use serde::{Deserialize, Serialize};

use crate::database::keys;
use crate::models::FlowDescriptor;

/// Per-flow running-execution counter. One row per flow, created lazily
/// with `running = 0` on first use and never deleted in normal operation.
///
/// Invariant: `running >= 0`. Decrements clamp at zero because completion
/// signals are delivered at-least-once upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyCounter {
    pub tenant_id: String,
    pub namespace: String,
    pub flow_id: String,
    pub running: i64,
}

impl ConcurrencyCounter {
    /// Fresh counter for a flow that has never been admitted.
    pub fn new(flow: &FlowDescriptor) -> Self {
        Self {
            tenant_id: flow.tenant_id.clone(),
            namespace: flow.namespace.clone(),
            flow_id: flow.flow_id.clone(),
            running: 0,
        }
    }

    pub fn record_key(&self) -> String {
        keys::counter_key(&self.tenant_id, &self.namespace, &self.flow_id)
    }

    /// Increment and return the new running count.
    pub fn increment(&mut self) -> i64 {
        self.running += 1;
        self.running
    }

    /// Decrement floored at zero and return the new running count.
    /// Duplicate or late completion signals land here as no-ops.
    pub fn decrement_clamped(&mut self) -> i64 {
        self.running = (self.running - 1).max(0);
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_flow() -> FlowDescriptor {
        FlowDescriptor::new("acme", "prod", "nightly-etl", 2)
    }

    #[test]
    fn test_new_counter_starts_at_zero() {
        let counter = ConcurrencyCounter::new(&test_flow());
        assert_eq!(counter.running, 0);
        assert_eq!(counter.record_key(), "concurrency_limit/acme/prod/nightly-etl");
    }

    #[test]
    fn test_increment_then_decrement_round_trips() {
        let mut counter = ConcurrencyCounter::new(&test_flow());
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.decrement_clamped(), 1);
        assert_eq!(counter.decrement_clamped(), 0);
    }

    #[test]
    fn test_decrement_clamps_at_zero() {
        let mut counter = ConcurrencyCounter::new(&test_flow());
        assert_eq!(counter.decrement_clamped(), 0);
        assert_eq!(counter.decrement_clamped(), 0);
        assert_eq!(counter.running, 0);
    }

    proptest! {
        // running never goes negative under any admit/complete interleaving
        #[test]
        fn prop_running_stays_non_negative(ops in proptest::collection::vec(any::<bool>(), 0..256)) {
            let mut counter = ConcurrencyCounter::new(&test_flow());
            for increment in ops {
                if increment {
                    counter.increment();
                } else {
                    counter.decrement_clamped();
                }
                prop_assert!(counter.running >= 0);
            }
        }
    }
}
