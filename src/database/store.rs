//! Row-level primitives over the shared record table.
//!
//! Every entity in this crate is one row in `flowgate_records`: an indexed
//! key, a version stamp regenerated on each write, and an opaque JSONB
//! payload. All mutual exclusion in the system reduces to the four access
//! shapes below:
//!
//! - locked point-read (`FOR UPDATE`)
//! - locked ordered range-scan with skip-on-contention
//!   (`FOR UPDATE SKIP LOCKED`)
//! - conflict-tolerant insert (`ON CONFLICT DO NOTHING`)
//! - delete-by-key
//!
//! Callers pass the connection of their ongoing transaction, in the style of
//! the `*_with_transaction` model methods elsewhere in the ecosystem, so
//! multi-row operations compose into a single commit.

use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

/// One versioned row of the shared store.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRecord {
    pub record_key: String,
    pub record_version: Uuid,
    pub payload: Value,
}

/// Point-read a row without locking it. Administrative reads only.
pub async fn fetch(
    conn: &mut PgConnection,
    key: &str,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_key, record_version, payload
        FROM flowgate_records
        WHERE record_key = $1
        "#,
    )
    .bind(key)
    .fetch_optional(conn)
    .await
}

/// Point-read a row and hold its lock until the transaction ends.
pub async fn fetch_locked(
    conn: &mut PgConnection,
    key: &str,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_key, record_version, payload
        FROM flowgate_records
        WHERE record_key = $1
        FOR UPDATE
        "#,
    )
    .bind(key)
    .fetch_optional(conn)
    .await
}

/// Insert a row unless the key already exists. Returns whether this call
/// created the row. A concurrent uncommitted insert for the same key makes
/// this statement wait for that writer, then report `false`.
pub async fn try_create(
    conn: &mut PgConnection,
    key: &str,
    payload: &Value,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO flowgate_records (record_key, record_version, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (record_key) DO NOTHING
        "#,
    )
    .bind(key)
    .bind(Uuid::new_v4())
    .bind(payload)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write a row, creating it if absent, with a fresh version stamp.
pub async fn persist(
    conn: &mut PgConnection,
    key: &str,
    payload: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO flowgate_records (record_key, record_version, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (record_key) DO UPDATE
        SET payload = EXCLUDED.payload,
            record_version = EXCLUDED.record_version
        "#,
    )
    .bind(key)
    .bind(Uuid::new_v4())
    .bind(payload)
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete a row by key. Returns whether a row was removed.
pub async fn delete(conn: &mut PgConnection, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM flowgate_records
        WHERE record_key = $1
        "#,
    )
    .bind(key)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Lock and return the first row in `[lo, hi)` key order, skipping rows
/// already locked by concurrent transactions. A contended oldest row is
/// therefore invisible here rather than a blocking point.
pub async fn fetch_oldest_locked(
    conn: &mut PgConnection,
    lo: &str,
    hi: &str,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_key, record_version, payload
        FROM flowgate_records
        WHERE record_key >= $1 AND record_key < $2
        ORDER BY record_key
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(lo)
    .bind(hi)
    .fetch_optional(conn)
    .await
}

/// Lock and return up to `limit` rows in `[lo, hi)` key order, skipping
/// contended rows.
pub async fn fetch_range_locked(
    conn: &mut PgConnection,
    lo: &str,
    hi: &str,
    limit: i64,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_key, record_version, payload
        FROM flowgate_records
        WHERE record_key >= $1 AND record_key < $2
        ORDER BY record_key
        LIMIT $3
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(lo)
    .bind(hi)
    .bind(limit)
    .fetch_all(conn)
    .await
}

/// Unlocked, eventually-consistent range scan for administrative listings.
pub async fn scan_range(
    conn: &mut PgConnection,
    lo: &str,
    hi: &str,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_key, record_version, payload
        FROM flowgate_records
        WHERE record_key >= $1 AND record_key < $2
        ORDER BY record_key
        "#,
    )
    .bind(lo)
    .bind(hi)
    .fetch_all(conn)
    .await
}
