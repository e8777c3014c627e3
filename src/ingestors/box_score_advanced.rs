//! Advanced box score lines: efficiency-style metrics, percentage fields
//! constrained to their documented [0,1]/[0,100] convention. Era-gated to
//! 1996. Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_BOX_ADVANCED};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_percentage, require_positive_id, PercentConvention};

pub struct BoxScoreAdvancedRow {
    pub game_id: String,
    pub player_id: i64,
    pub team_id: i64,
    pub usage_pct: f64,
    pub true_shooting_pct: f64,
}

pub struct BoxScoreAdvancedIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl BoxScoreAdvancedIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for BoxScoreAdvancedIngestor {
    type Row = BoxScoreAdvancedRow;

    fn entity_kind(&self) -> &'static str {
        "box_score_advanced"
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
            .get_json(&self.ctx, "boxscores/advanced", &[("game_id", entity_id)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "player_lines", move |item| {
            Ok(BoxScoreAdvancedRow {
                game_id: game_id.clone(),
                player_id: require_positive_id(item, "player_id")?,
                team_id: require_positive_id(item, "team_id")?,
                usage_pct: require_percentage(item, "usage_pct", PercentConvention::ZeroToHundred)?,
                true_shooting_pct: require_percentage(item, "true_shooting_pct", PercentConvention::ZeroToOne)?,
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
                "INSERT INTO box_score_advanced (game_id, player_id, team_id, usage_pct, true_shooting_pct) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, player_id) DO UPDATE SET \
                    team_id = excluded.team_id, usage_pct = excluded.usage_pct, \
                    true_shooting_pct = excluded.true_shooting_pct",
            )
            .bind(&row.game_id)
            .bind(row.player_id)
            .bind(row.team_id)
            .bind(row.usage_pct)
            .bind(row.true_shooting_pct)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_BOX_ADVANCED).await?;
        Ok(rows.len() as i64)
    }
}
