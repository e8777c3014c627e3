//! Shot chart events (location, make/miss) for one game. Era-gated to
//! 1996. Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_SHOT_CHART};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_non_negative_count, require_positive_id, FieldError};

pub struct ShotChartEventRow {
    pub game_id: String,
    pub player_id: i64,
    pub loc_x: i64,
    pub loc_y: i64,
    pub made: bool,
}

pub struct ShotChartsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl ShotChartsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for ShotChartsIngestor {
    type Row = ShotChartEventRow;

    fn entity_kind(&self) -> &'static str {
        "shot_charts"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    fn era_check(&self, kwargs: &Kwargs) -> Result<(), IngestError> {
        match kwargs.season_year() {
            Some(year) => era_gate::check(EraFamily::StatsApiBoxScore, year),
            None => Ok(()),
        }
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        self.client.get_json(&self.ctx, "shotcharts", &[("game_id", entity_id)]).await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "shots", move |item| {
            let made = item
                .get("made")
                .and_then(Value::as_bool)
                .ok_or_else(|| FieldError::new("made", "missing or not a boolean"))?;
            Ok(ShotChartEventRow {
                game_id: game_id.clone(),
                player_id: require_positive_id(item, "player_id")?,
                loc_x: require_non_negative_count(item, "loc_x")?,
                loc_y: require_non_negative_count(item, "loc_y")?,
                made,
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        require_parent_exists(pool, "games", "game_id", &rows[0].game_id).await?;
        let mut tx = pool.begin().await?;
        for (i, row) in rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO shot_chart_events (game_id, shot_num, player_id, loc_x, loc_y, made) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, shot_num) DO UPDATE SET \
                    player_id = excluded.player_id, loc_x = excluded.loc_x, loc_y = excluded.loc_y, made = excluded.made",
            )
            .bind(&row.game_id)
            .bind(i as i64)
            .bind(row.player_id)
            .bind(row.loc_x)
            .bind(row.loc_y)
            .bind(row.made)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_SHOT_CHART).await?;
        Ok(rows.len() as i64)
    }
}
