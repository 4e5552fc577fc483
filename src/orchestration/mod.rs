//! # Admission Core
//!
//! The concurrency-admission and queueing components of the orchestration
//! engine. Many executor processes call these concurrently against one
//! shared PostgreSQL store; there is no leader, broker, or in-process lock.
//! Every operation runs inside exactly one transaction, and all mutual
//! exclusion is row-level and transaction-scoped.
//!
//! ## Core Components
//!
//! - **ConcurrencyGate**: owns the per-flow running counter; decides
//!   admit-or-queue, decrements on completion, and atomically
//!   decrements-then-releases the next queued execution
//! - **WaitQueue**: FIFO-per-flow holding area for executions refused
//!   admission, with safe concurrent single-item pop
//! - **DelayTimer**: holding area for executions deferred to a future
//!   instant, with safe concurrent bulk pop-when-due
//!
//! Lock ordering is fixed: the gate locks a flow's counter row before any
//! queue row, and `enqueue` never touches the counter row, so the two
//! cannot deadlock against each other.

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::error::Result;

pub mod concurrency_gate;
pub mod delay_timer;
pub mod wait_queue;

pub use concurrency_gate::{AdmissionDecision, ConcurrencyGate, GateConfig, ReleaseOutcome};
pub use delay_timer::{DelayTimer, DelayTimerConfig};
pub use wait_queue::WaitQueue;

/// A transactional continuation: invoked while the popped row's lock is
/// held, on the same connection as the surrounding transaction, so its
/// writes commit or roll back together with the pop. An error here aborts
/// the whole operation and leaves the row poppable again.
///
/// Call sites remain responsible for side effects that escape the
/// transaction (network sends, in-process state): those must be idempotent
/// under retry.
#[async_trait]
pub trait TransactionalConsumer<T: Send + Sync>: Send + Sync {
    async fn consume(&self, conn: &mut PgConnection, item: &T) -> Result<()>;
}
