//! Hustle stats (deflections, loose balls recovered, charges drawn):
//! tracked only from 2015 onward. Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_BOX_HUSTLE};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_non_negative_count, require_positive_id};

pub struct HustleRow {
    pub game_id: String,
    pub player_id: i64,
    pub deflections: i64,
    pub loose_balls_recovered: i64,
    pub charges_drawn: i64,
}

pub struct BoxScoreHustleIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl BoxScoreHustleIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for BoxScoreHustleIngestor {
    type Row = HustleRow;

    fn entity_kind(&self) -> &'static str {
        "box_score_hustle"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    fn era_check(&self, kwargs: &Kwargs) -> Result<(), IngestError> {
        match kwargs.season_year() {
            Some(year) => era_gate::check(EraFamily::Hustle, year),
            None => Ok(()),
        }
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        self.client
            .get_json(&self.ctx, "boxscores/hustle", &[("game_id", entity_id)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "player_lines", move |item| {
            Ok(HustleRow {
                game_id: game_id.clone(),
                player_id: require_positive_id(item, "player_id")?,
                deflections: require_non_negative_count(item, "deflections")?,
                loose_balls_recovered: require_non_negative_count(item, "loose_balls_recovered")?,
                charges_drawn: require_non_negative_count(item, "charges_drawn")?,
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            require_parent_exists(pool, "games", "game_id", &row.game_id).await?;
            require_parent_exists(pool, "players", "player_id", &row.player_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO box_score_hustle (game_id, player_id, deflections, loose_balls_recovered, charges_drawn) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, player_id) DO UPDATE SET \
                    deflections = excluded.deflections, \
                    loose_balls_recovered = excluded.loose_balls_recovered, \
                    charges_drawn = excluded.charges_drawn",
            )
            .bind(&row.game_id)
            .bind(row.player_id)
            .bind(row.deflections)
            .bind(row.loose_balls_recovered)
            .bind(row.charges_drawn)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_BOX_HUSTLE).await?;
        Ok(rows.len() as i64)
    }
}
