//! Awards (MVP, All-NBA, DPOY, etc.): per-player, stage 4.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_positive_id, require_str};

pub struct AwardRow {
    pub player_id: i64,
    pub season_id: i32,
    pub award_name: String,
    pub team_id: Option<i64>,
}

pub struct AwardsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl AwardsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for AwardsIngestor {
    type Row = AwardRow;

    fn entity_kind(&self) -> &'static str {
        "awards"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        self.client.get_json(&self.ctx, "awards", &[("player_id", entity_id)]).await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let player_id = require_positive_id(&raw, "player_id")
            .map_err(|e| IngestError::ValidationFailedPayload(e.message))?;

        Ok(ValidatedBatch::from_list_field(&raw, "awards", move |item| {
            let season_label = require_str(item, "season")?;
            let season_id = season_label
                .split('-')
                .next()
                .and_then(|y| y.parse::<i32>().ok())
                .ok_or_else(|| crate::validation::FieldError::new("season", "not a parseable season label"))?;
            let team_id = item.get("team_id").and_then(Value::as_i64);
            Ok(AwardRow {
                player_id,
                season_id,
                award_name: require_str(item, "award_name")?.to_string(),
                team_id,
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        for row in rows {
            require_parent_exists(pool, "players", "player_id", &row.player_id.to_string()).await?;
            require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO awards (player_id, season_id, award_name, team_id) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (player_id, season_id, award_name) DO UPDATE SET team_id = excluded.team_id",
            )
            .bind(row.player_id)
            .bind(row.season_id)
            .bind(&row.award_name)
            .bind(row.team_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}
