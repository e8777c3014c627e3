//! Games: the 10-char game id is the FK target for nearly every per-game
//! child row (box scores, PBP, shot charts, lineups, officials).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_iso_date, require_positive_id, require_str, FieldError, RowValidation};

pub struct GameRow {
    pub game_id: String,
    pub season_id: i32,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub game_date: String,
}

pub struct GamesIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl GamesIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for GamesIngestor {
    type Row = GameRow;

    fn entity_kind(&self) -> &'static str {
        "games"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        self.client.get_json(&self.ctx, "games", &[("game_id", entity_id)]).await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        Ok(match parse(&raw) {
            Ok(row) => ValidatedBatch::all_valid(vec![row]),
            Err(e) => {
                let mut v = RowValidation::default();
                v.push(e.field, e.message);
                ValidatedBatch {
                    valid: Vec::new(),
                    rejected: vec![(raw, v)],
                }
            }
        })
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        for row in rows {
            require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
            require_parent_exists(pool, "teams", "team_id", &row.home_team_id.to_string()).await?;
            require_parent_exists(pool, "teams", "team_id", &row.away_team_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO games (game_id, season_id, home_team_id, away_team_id, game_date, data_availability_flags) \
                 VALUES (?, ?, ?, ?, ?, 0) \
                 ON CONFLICT (game_id) DO UPDATE SET game_date = excluded.game_date",
            )
            .bind(&row.game_id)
            .bind(row.season_id)
            .bind(row.home_team_id)
            .bind(row.away_team_id)
            .bind(&row.game_date)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

/// Bits of `games.data_availability_flags`, OR'd in as each per-game data
/// family successfully ingests. Monotonic: bits are only ever set, never
/// cleared.
pub const FLAG_BOX_TRADITIONAL: i64 = 1 << 0;
pub const FLAG_BOX_ADVANCED: i64 = 1 << 1;
pub const FLAG_BOX_HUSTLE: i64 = 1 << 2;
pub const FLAG_PLAY_BY_PLAY: i64 = 1 << 3;
pub const FLAG_SHOT_CHART: i64 = 1 << 4;
pub const FLAG_LINEUPS: i64 = 1 << 5;
pub const FLAG_OFFICIALS: i64 = 1 << 6;
pub const FLAG_TRACKING: i64 = 1 << 7;
pub const FLAG_TEAM_OTHER_STATS: i64 = 1 << 8;

/// OR's `bit` into `games.data_availability_flags` for `game_id`. Bits are
/// never cleared -- callers only invoke this after a successful upsert of
/// the corresponding data family.
pub async fn mark_available(pool: &SqlitePool, game_id: &str, bit: i64) -> Result<(), IngestError> {
    sqlx::query("UPDATE games SET data_availability_flags = data_availability_flags | ? WHERE game_id = ?")
        .bind(bit)
        .bind(game_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn parse(raw: &Value) -> Result<GameRow, FieldError> {
    let game_id = require_str(raw, "game_id")?.to_string();
    if game_id.len() != 10 {
        return Err(FieldError::new("game_id", "must be a 10-character game id"));
    }
    let season_label = require_str(raw, "season")?;
    let season_id = season_label
        .split('-')
        .next()
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("season", "not a parseable season label"))?;
    Ok(GameRow {
        game_id,
        season_id,
        home_team_id: require_positive_id(raw, "home_team_id")?,
        away_team_id: require_positive_id(raw, "away_team_id")?,
        game_date: require_iso_date(raw, "game_date")?.to_string(),
    })
}
