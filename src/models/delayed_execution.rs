use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::keys;

/// An execution whose start is deferred to a future instant.
///
/// Keyed by release timestamp so the timer's due-scan is a plain key range.
/// All timestamps are UTC regardless of where the scheduling process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedExecution {
    pub execution_id: String,
    pub release_at: DateTime<Utc>,
    pub execution: Value,
}

impl DelayedExecution {
    pub fn new(
        execution_id: impl Into<String>,
        release_at: DateTime<Utc>,
        execution: Value,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            release_at,
            execution,
        }
    }

    pub fn record_key(&self) -> String {
        keys::delayed_key(self.release_at, &self.execution_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key_orders_by_release_time() {
        let now = Utc::now();
        let sooner = DelayedExecution::new("exec-z", now, json!({}));
        let later =
            DelayedExecution::new("exec-a", now + chrono::Duration::seconds(30), json!({}));

        assert!(sooner.record_key() < later.record_key());
    }
}
