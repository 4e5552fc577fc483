//! Schema bootstrap for the shared record table.
//!
//! Many executor processes may start at once against the same database, so
//! schema creation runs under a PostgreSQL advisory lock: one process
//! applies the idempotent DDL while the rest wait on the lock.

use sqlx::PgPool;

/// Advisory lock key for schema initialization, derived from
/// "flowgate_records_schema_init".
const SCHEMA_LOCK_KEY: i64 = 6_214_207_870_113_551;

const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS flowgate_records (
    record_key     TEXT COLLATE "C" PRIMARY KEY,
    record_version UUID NOT NULL,
    payload        JSONB NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Manages database schema setup with concurrency safety.
pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Ensure the record table exists. Safe to run from any number of
    /// processes concurrently; the DDL itself is idempotent and the
    /// advisory lock serializes the attempts.
    ///
    /// The `COLLATE "C"` on the key column is load-bearing: range scans
    /// rely on bytewise key comparison matching the zero-padded timestamp
    /// encoding, independent of the database's default collation.
    pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::Error> {
        // Advisory locks are session-scoped, so lock, DDL and unlock must
        // share one connection.
        let mut conn = pool.acquire().await?;

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let result = sqlx::query(CREATE_RECORDS_TABLE).execute(&mut *conn).await;

        // Always release the lock, even when the DDL failed.
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        result.map(|_| ())
    }
}
