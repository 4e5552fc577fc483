#![allow(dead_code)]

//! Shared helpers for integration tests.
//!
//! All integration tests require a live PostgreSQL instance and skip
//! themselves when `DATABASE_URL` is unset, so the unit suite stays
//! runnable anywhere. Flows get unique ids per test run, which keeps
//! parallel test binaries from contending on the same counter rows.

use flowgate_core::database::DatabaseMigrations;
use flowgate_core::models::FlowDescriptor;
use sqlx::PgPool;
use uuid::Uuid;

/// Connect to the test database and ensure the schema exists, or `None`
/// when `DATABASE_URL` is not configured.
pub async fn try_test_pool() -> Option<PgPool> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping: DATABASE_URL not set");
            return None;
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    DatabaseMigrations::run_all(&pool)
        .await
        .expect("Failed to bootstrap schema");

    Some(pool)
}

/// A flow descriptor with a unique flow id, isolated from other tests.
pub fn unique_flow(limit: i64) -> FlowDescriptor {
    FlowDescriptor::new("test-tenant", "test-ns", format!("flow-{}", Uuid::new_v4()), limit)
}
