//! Foreign-key precheck: verify a referenced parent row exists before a
//! child upsert is attempted. Unlike a typical "get or create" helper,
//! this never creates the missing parent on demand -- a missing parent is
//! an upstream-ordering problem to surface, not something an ingestor may
//! paper over.

use sqlx::SqlitePool;

use crate::errors::IngestError;

/// Checks that a row with `value` exists in `table.column`. `table` and
/// `column` must be trusted identifiers (compile-time constants supplied by
/// each ingestor), never user input -- they're interpolated into the query
/// text because sqlx can't bind identifiers as parameters.
pub async fn require_parent_exists(
    pool: &SqlitePool,
    table: &'static str,
    column: &'static str,
    value: &str,
) -> Result<(), IngestError> {
    let sql = format!("SELECT 1 FROM {table} WHERE {column} = ? LIMIT 1");
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await?;

    if found.is_some() {
        Ok(())
    } else {
        Err(IngestError::MissingFk {
            table,
            column,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn missing_parent_is_fatal() {
        let store = Store::connect_in_memory().await.unwrap();
        sqlx::query("CREATE TABLE teams (team_id TEXT PRIMARY KEY)")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = require_parent_exists(&store.pool, "teams", "team_id", "1610612747")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingFk { .. }));
        assert!(err.to_string().starts_with("missing_fk(teams,team_id,"));
    }

    #[tokio::test]
    async fn existing_parent_passes() {
        let store = Store::connect_in_memory().await.unwrap();
        sqlx::query("CREATE TABLE teams (team_id TEXT PRIMARY KEY)")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO teams (team_id) VALUES ('1610612747')")
            .execute(&store.pool)
            .await
            .unwrap();

        require_parent_exists(&store.pool, "teams", "team_id", "1610612747")
            .await
            .unwrap();
    }
}
