#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Flowgate Core
//!
//! Concurrency-admission and queueing core for a distributed
//! workflow-orchestration engine.
//!
//! ## Overview
//!
//! Independent executor processes request to run executions of a flow.
//! Flows may cap simultaneous executions; this crate decides, for every
//! start and finish event, whether to admit immediately, hold in a FIFO
//! wait queue, or release later. Correctness rests entirely on relational
//! transactions over one shared PostgreSQL store: no lock manager, leader
//! election, or broker is assumed, and any caller may die mid-transaction
//! without stranding queued work.
//!
//! ## Architecture
//!
//! - A per-flow counter row is the distributed semaphore; it is always
//!   lock-read before write, so counter mutation is linearizable per flow.
//! - Queued and delayed executions are popped with
//!   `FOR UPDATE SKIP LOCKED`, giving at-most-once hand-off across
//!   concurrent poppers without blocking.
//! - Decrement and release share a single transaction, closing the race
//!   where two completions both observe a saturated limit and neither
//!   drains the queue.
//!
//! All three entity kinds are rows in one shared key/versioned-payload
//! table, distinguished by key shape alone.
//!
//! ## Module Organization
//!
//! - [`models`] - Counter, queued-execution and delayed-execution payloads
//! - [`database`] - Connection management, schema bootstrap, key encoding,
//!   and row-level locking primitives
//! - [`orchestration`] - The concurrency gate, wait queue and delay timer
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgate_core::models::FlowDescriptor;
//! use flowgate_core::orchestration::{AdmissionDecision, ConcurrencyGate, WaitQueue};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let gate = ConcurrencyGate::new(pool.clone());
//! let queue = WaitQueue::new(pool);
//!
//! let flow = FlowDescriptor::new("acme", "prod", "nightly-etl", 2);
//! match gate.try_admit(&flow).await? {
//!     AdmissionDecision::Run => { /* start the execution */ }
//!     AdmissionDecision::Queued => { /* enqueue it via `queue` */ }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;

pub use config::FlowgateConfig;
pub use error::{FlowgateError, Result};
pub use models::{ConcurrencyCounter, DelayedExecution, FlowDescriptor, QueuedExecution};
pub use orchestration::{
    AdmissionDecision, ConcurrencyGate, DelayTimer, ReleaseOutcome, TransactionalConsumer,
    WaitQueue,
};
