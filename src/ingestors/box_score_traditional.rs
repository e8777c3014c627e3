//! Traditional box score lines: one row per player per game. Era-gated to
//! 1996 onward (stats-API box score family). Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_BOX_TRADITIONAL};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_non_negative_count, require_positive_id};

pub struct BoxScoreTraditionalRow {
    pub game_id: String,
    pub player_id: i64,
    pub team_id: i64,
    pub points: i64,
    pub rebounds: i64,
    pub assists: i64,
    pub minutes: i64,
}

pub struct BoxScoreTraditionalIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl BoxScoreTraditionalIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for BoxScoreTraditionalIngestor {
    type Row = BoxScoreTraditionalRow;

    fn entity_kind(&self) -> &'static str {
        "box_score_traditional"
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
        self.client
            .get_json(&self.ctx, "boxscores/traditional", &[("game_id", entity_id)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "player_lines", move |item| {
            Ok(BoxScoreTraditionalRow {
                game_id: game_id.clone(),
                player_id: require_positive_id(item, "player_id")?,
                team_id: require_positive_id(item, "team_id")?,
                points: require_non_negative_count(item, "points")?,
                rebounds: require_non_negative_count(item, "rebounds")?,
                assists: require_non_negative_count(item, "assists")?,
                minutes: require_non_negative_count(item, "minutes")?,
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
                "INSERT INTO box_score_traditional (game_id, player_id, team_id, points, rebounds, assists, minutes) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, player_id) DO UPDATE SET \
                    team_id = excluded.team_id, points = excluded.points, rebounds = excluded.rebounds, \
                    assists = excluded.assists, minutes = excluded.minutes",
            )
            .bind(&row.game_id)
            .bind(row.player_id)
            .bind(row.team_id)
            .bind(row.points)
            .bind(row.rebounds)
            .bind(row.assists)
            .bind(row.minutes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_BOX_TRADITIONAL).await?;
        Ok(rows.len() as i64)
    }
}
