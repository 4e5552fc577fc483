use serde::{Deserialize, Serialize};

/// The slice of a flow definition this crate consumes, read-only.
///
/// A flow that declares no concurrency limit never reaches the gate; by the
/// time a descriptor arrives here, `concurrency_limit` is expected to be a
/// positive integer. A non-positive limit is treated as unlimited by the
/// standard admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDescriptor {
    pub tenant_id: String,
    pub namespace: String,
    pub flow_id: String,
    pub concurrency_limit: i64,
}

impl FlowDescriptor {
    pub fn new(
        tenant_id: impl Into<String>,
        namespace: impl Into<String>,
        flow_id: impl Into<String>,
        concurrency_limit: i64,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            namespace: namespace.into(),
            flow_id: flow_id.into(),
            concurrency_limit,
        }
    }
}
