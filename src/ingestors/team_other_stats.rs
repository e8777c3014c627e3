//! Team-level miscellaneous stats: one row per team per game (fast-break
//! points, points off turnovers, second-chance points, points in the
//! paint). Distinct from `team_advanced`, which is one row per team per
//! season. Era-gated to 1996 onward (stats-API box score family). Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_TEAM_OTHER_STATS};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_non_negative_count, require_positive_id};

pub struct TeamOtherStatsRow {
    pub game_id: String,
    pub team_id: i64,
    pub fast_break_points: i64,
    pub points_off_turnovers: i64,
    pub second_chance_points: i64,
    pub points_in_paint: i64,
}

pub struct TeamOtherStatsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl TeamOtherStatsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for TeamOtherStatsIngestor {
    type Row = TeamOtherStatsRow;

    fn entity_kind(&self) -> &'static str {
        "team_other_stats"
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
            .get_json(&self.ctx, "boxscores/teamstats", &[("game_id", entity_id)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "team_lines", move |item| {
            Ok(TeamOtherStatsRow {
                game_id: game_id.clone(),
                team_id: require_positive_id(item, "team_id")?,
                fast_break_points: require_non_negative_count(item, "fast_break_points")?,
                points_off_turnovers: require_non_negative_count(item, "points_off_turnovers")?,
                second_chance_points: require_non_negative_count(item, "second_chance_points")?,
                points_in_paint: require_non_negative_count(item, "points_in_paint")?,
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            require_parent_exists(pool, "games", "game_id", &row.game_id).await?;
            require_parent_exists(pool, "teams", "team_id", &row.team_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO team_other_stats (game_id, team_id, fast_break_points, points_off_turnovers, \
                    second_chance_points, points_in_paint) VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, team_id) DO UPDATE SET \
                    fast_break_points = excluded.fast_break_points, \
                    points_off_turnovers = excluded.points_off_turnovers, \
                    second_chance_points = excluded.second_chance_points, \
                    points_in_paint = excluded.points_in_paint",
            )
            .bind(&row.game_id)
            .bind(row.team_id)
            .bind(row.fast_break_points)
            .bind(row.points_off_turnovers)
            .bind(row.second_chance_points)
            .bind(row.points_in_paint)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_TEAM_OTHER_STATS).await?;
        Ok(rows.len() as i64)
    }
}
