//! Record-key encoding for the shared store.
//!
//! All three entity kinds live in one table and are distinguished by key
//! shape alone:
//!
//! ```text
//! concurrency_limit/{tenant}/{namespace}/{flow}
//! execution_queued/{tenant}/{namespace}/{flow}/{micros:020}/{execution_id}
//! execution_delayed/{micros:020}/{execution_id}
//! ```
//!
//! Timestamps are UTC microseconds since the Unix epoch, zero-padded to 20
//! digits so that bytewise key order agrees with chronological order. The
//! store column carries `COLLATE "C"` for the same reason. Identifier
//! segments (tenant, namespace, flow, execution id) must not contain `/`.

use chrono::{DateTime, Utc};

pub const COUNTER_PREFIX: &str = "concurrency_limit";
pub const QUEUED_PREFIX: &str = "execution_queued";
pub const DELAYED_PREFIX: &str = "execution_delayed";

/// Key of a flow's concurrency counter row.
pub fn counter_key(tenant_id: &str, namespace: &str, flow_id: &str) -> String {
    format!("{COUNTER_PREFIX}/{tenant_id}/{namespace}/{flow_id}")
}

/// Scan prefix covering every counter row of one tenant.
pub fn counter_scan_prefix(tenant_id: &str) -> String {
    format!("{COUNTER_PREFIX}/{tenant_id}/")
}

/// Key of a queued execution. Enqueue time leads the execution id so that
/// plain key order is FIFO order, with the id as tie-breaker.
pub fn queued_key(
    tenant_id: &str,
    namespace: &str,
    flow_id: &str,
    enqueued_at: DateTime<Utc>,
    execution_id: &str,
) -> String {
    format!(
        "{QUEUED_PREFIX}/{tenant_id}/{namespace}/{flow_id}/{}/{execution_id}",
        encode_micros(enqueued_at)
    )
}

/// Scan prefix covering one flow's queued executions.
pub fn queued_scan_prefix(tenant_id: &str, namespace: &str, flow_id: &str) -> String {
    format!("{QUEUED_PREFIX}/{tenant_id}/{namespace}/{flow_id}/")
}

/// Scan prefix covering all queued executions across tenants.
pub fn queued_all_prefix() -> String {
    format!("{QUEUED_PREFIX}/")
}

/// Key of a delayed execution.
pub fn delayed_key(release_at: DateTime<Utc>, execution_id: &str) -> String {
    format!("{DELAYED_PREFIX}/{}/{execution_id}", encode_micros(release_at))
}

/// Scan prefix covering all delayed executions.
pub fn delayed_scan_prefix() -> String {
    format!("{DELAYED_PREFIX}/")
}

/// Exclusive upper bound selecting every delayed execution whose release
/// instant is at or before `now`.
pub fn delayed_due_upper_bound(now: DateTime<Utc>) -> String {
    format!(
        "{DELAYED_PREFIX}/{}",
        encode_micros_raw(now.timestamp_micros().saturating_add(1))
    )
}

/// Exclusive upper bound for a prefix range scan: the prefix with its final
/// byte incremented. Prefixes end with `/`, so the bound is valid UTF-8.
pub fn prefix_upper_bound(prefix: &str) -> String {
    let mut bound = prefix.as_bytes().to_vec();
    if let Some(last) = bound.last_mut() {
        *last += 1;
    }
    String::from_utf8(bound).unwrap_or_else(|_| prefix.to_string())
}

fn encode_micros(instant: DateTime<Utc>) -> String {
    encode_micros_raw(instant.timestamp_micros())
}

fn encode_micros_raw(micros: i64) -> String {
    format!("{micros:020}")
}
