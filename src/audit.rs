//! The audit trail: one row per terminal `ingest()` outcome, keyed on
//! `(entity_kind, entity_id, source)`. Always written in its own
//! transaction, separate from the data upsert, so an audit row exists even
//! when the data transaction rolled back.

use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Empty,
    Failed,
    Skipped,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Empty => "EMPTY",
            AuditStatus::Failed => "FAILED",
            AuditStatus::Skipped => "SKIPPED",
        }
    }
}

/// Writes (or overwrites) the audit row for one `(entity_kind, entity_id,
/// source)` triple. Expects an `ingest_audit` table matching
/// `create_table` below.
pub async fn write(
    pool: &SqlitePool,
    entity_kind: &str,
    entity_id: &str,
    source: &str,
    status: AuditStatus,
    row_count: i64,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO ingest_audit (entity_kind, entity_id, source, ingested_at, status, row_count, error_message) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (entity_kind, entity_id, source) DO UPDATE SET \
            ingested_at = excluded.ingested_at, \
            status = excluded.status, \
            row_count = excluded.row_count, \
            error_message = excluded.error_message",
    )
    .bind(entity_kind)
    .bind(entity_id)
    .bind(source)
    .bind(Utc::now().to_rfc3339())
    .bind(status.as_str())
    .bind(row_count)
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ingest_audit ( \
            entity_kind TEXT NOT NULL, \
            entity_id TEXT NOT NULL, \
            source TEXT NOT NULL, \
            ingested_at TEXT NOT NULL, \
            status TEXT NOT NULL, \
            row_count INTEGER NOT NULL, \
            error_message TEXT, \
            PRIMARY KEY (entity_kind, entity_id, source) \
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn rerun_overwrites_the_same_audit_row() {
        let store = Store::connect_in_memory().await.unwrap();
        create_table(&store.pool).await.unwrap();

        write(&store.pool, "players", "201939", "stats_api", AuditStatus::Success, 1, None)
            .await
            .unwrap();
        write(&store.pool, "players", "201939", "stats_api", AuditStatus::Success, 0, None)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingest_audit")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "reruns for the same triple must overwrite, not accumulate");

        let row_count: i64 = sqlx::query_scalar("SELECT row_count FROM ingest_audit")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row_count, 0);
    }
}
