//! # Database Layer
//!
//! Connection management, schema bootstrap, and the row-level locking
//! primitives every component builds on.
//!
//! ## Key Components
//!
//! - [`connection`] - Database connection management and pooling
//! - [`migrations`] - Schema bootstrap with advisory-lock concurrency control
//! - [`keys`] - Record-key encoding shared by all entity kinds
//! - [`store`] - Locked point-reads, skip-locked range scans,
//!   conflict-tolerant inserts and deletes over the shared record table

pub mod connection;
pub mod keys;
pub mod migrations;
pub mod store;

pub use connection::DatabaseConnection;
pub use migrations::DatabaseMigrations;
pub use store::StoredRecord;
