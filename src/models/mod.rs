//! Data layer: the three entity kinds of the admission core plus the
//! read-only flow descriptor consumed from the flow configuration.

pub mod concurrency_counter;
pub mod delayed_execution;
pub mod flow;
pub mod queued_execution;

// Re-export core models for easy access
pub use concurrency_counter::ConcurrencyCounter;
pub use delayed_execution::DelayedExecution;
pub use flow::FlowDescriptor;
pub use queued_execution::QueuedExecution;
