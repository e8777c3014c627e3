//! Officials assigned to a game. Stage 3 (per-game). The stats API
//! sometimes returns zero officials for very old games -- that's the
//! `EMPTY` scenario (spec S3), not a validation failure.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_OFFICIALS};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_positive_id, require_str};

pub struct OfficialAssignmentRow {
    pub game_id: String,
    pub official_id: i64,
    pub full_name: String,
}

pub struct OfficialsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl OfficialsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for OfficialsIngestor {
    type Row = OfficialAssignmentRow;

    fn entity_kind(&self) -> &'static str {
        "officials"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        let value = self
            .client
            .get_json(&self.ctx, "officials", &[("game_id", entity_id)])
            .await?;
        match &value {
            Some(v) if v.get("officials").and_then(Value::as_array).map(Vec::is_empty).unwrap_or(true) => {
                Err(IngestError::SourceEmpty)
            }
            other => Ok(other.clone()),
        }
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = require_str(&raw, "game_id")
            .map_err(|e| IngestError::ValidationFailedPayload(e.message))?
            .to_string();
        Ok(ValidatedBatch::from_list_field(&raw, "officials", move |item| {
            Ok(OfficialAssignmentRow {
                game_id: game_id.clone(),
                official_id: require_positive_id(item, "official_id")?,
                full_name: require_str(item, "full_name")?.to_string(),
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            require_parent_exists(pool, "games", "game_id", &row.game_id).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO officials (official_id, full_name) VALUES (?, ?) \
                 ON CONFLICT (official_id) DO UPDATE SET full_name = excluded.full_name",
            )
            .bind(row.official_id)
            .bind(&row.full_name)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "INSERT INTO game_officials (game_id, official_id) VALUES (?, ?) \
                 ON CONFLICT (game_id, official_id) DO NOTHING",
            )
            .bind(&row.game_id)
            .bind(row.official_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_OFFICIALS).await?;
        Ok(rows.len() as i64)
    }
}
