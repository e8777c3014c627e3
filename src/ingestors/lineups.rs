//! Five-man lineups for one game, keyed by a stable fingerprint over the
//! five player ids (sorted, so the same five players always fingerprint
//! identically regardless of source ordering). Era-gated to 1996. Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::cache::fingerprint;
use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_LINEUPS};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_distinct, require_non_negative_count, require_positive_id, FieldError};

pub struct LineupRow {
    pub game_id: String,
    pub team_id: i64,
    pub lineup_fingerprint: String,
    pub player_ids: [i64; 5],
    pub seconds_played: i64,
}

pub struct LineupsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl LineupsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for LineupsIngestor {
    type Row = LineupRow;

    fn entity_kind(&self) -> &'static str {
        "lineups"
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
        self.client.get_json(&self.ctx, "lineups", &[("game_id", entity_id)]).await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "lineups", move |item| {
            let team_id = require_positive_id(item, "team_id")?;
            let raw_ids = item
                .get("player_ids")
                .and_then(Value::as_array)
                .ok_or_else(|| FieldError::new("player_ids", "missing or not an array"))?;
            if raw_ids.len() != 5 {
                return Err(FieldError::new("player_ids", "must contain exactly five player ids"));
            }
            let mut player_ids = [0i64; 5];
            for (i, v) in raw_ids.iter().enumerate() {
                player_ids[i] = v
                    .as_i64()
                    .ok_or_else(|| FieldError::new("player_ids", "every id must be an integer"))?;
            }
            require_distinct(&player_ids, "player_ids")?;

            let mut sorted = player_ids;
            sorted.sort_unstable();
            let fp = fingerprint(
                "lineup",
                &sorted.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
            );

            Ok(LineupRow {
                game_id: game_id.clone(),
                team_id,
                lineup_fingerprint: fp,
                player_ids,
                seconds_played: require_non_negative_count(item, "seconds_played")?,
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        require_parent_exists(pool, "games", "game_id", &rows[0].game_id).await?;
        for row in rows {
            require_parent_exists(pool, "teams", "team_id", &row.team_id.to_string()).await?;
            for player_id in row.player_ids {
                require_parent_exists(pool, "players", "player_id", &player_id.to_string()).await?;
            }
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO lineups (game_id, team_id, lineup_fingerprint, player_ids, seconds_played) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, lineup_fingerprint) DO UPDATE SET seconds_played = excluded.seconds_played",
            )
            .bind(&row.game_id)
            .bind(row.team_id)
            .bind(&row.lineup_fingerprint)
            .bind(row.player_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(","))
            .bind(row.seconds_played)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_LINEUPS).await?;
        Ok(rows.len() as i64)
    }
}
