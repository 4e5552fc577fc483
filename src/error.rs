//! Structured error handling for admission, queueing and timer operations.

/// Errors surfaced by the gate, queue and timer components.
///
/// Transient database contention (lock-wait timeout, serialization failure)
/// arrives as [`FlowgateError::Database`]; the executor tier owns the retry
/// policy for those. Every operation in this crate is safe to retry blindly.
#[derive(Debug, thiserror::Error)]
pub enum FlowgateError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A counter row could not be read back after a conflict-tolerated
    /// create. The insert-then-reselect pattern guarantees the row exists
    /// once the conflicting writer commits, so this is a logic error, not
    /// a transient condition.
    #[error("Concurrency counter unavailable after creation: {0}")]
    CounterUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, FlowgateError>;
