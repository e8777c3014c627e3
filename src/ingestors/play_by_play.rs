//! Play-by-play events for one game. Era-gated to 1996. Stage 3.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::ingestors::games::{mark_available, FLAG_PLAY_BY_PLAY};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{optional_str, require_non_negative_count, require_str};

pub struct PlayByPlayEventRow {
    pub game_id: String,
    pub event_num: i64,
    pub period: i64,
    pub clock: String,
    pub description: Option<String>,
}

pub struct PlayByPlayIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl PlayByPlayIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for PlayByPlayIngestor {
    type Row = PlayByPlayEventRow;

    fn entity_kind(&self) -> &'static str {
        "play_by_play"
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
        self.client.get_json(&self.ctx, "pbp", &[("game_id", entity_id)]).await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let game_id = raw
            .get("game_id")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing game_id".into()))?
            .to_string();

        Ok(ValidatedBatch::from_list_field(&raw, "events", move |item| {
            Ok(PlayByPlayEventRow {
                game_id: game_id.clone(),
                event_num: require_non_negative_count(item, "event_num")?,
                period: require_non_negative_count(item, "period")?,
                clock: require_str(item, "clock")?.to_string(),
                description: optional_str(item, "description").map(str::to_string),
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        require_parent_exists(pool, "games", "game_id", &rows[0].game_id).await?;
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO play_by_play_events (game_id, event_num, period, clock, description) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (game_id, event_num) DO UPDATE SET \
                    period = excluded.period, clock = excluded.clock, description = excluded.description",
            )
            .bind(&row.game_id)
            .bind(row.event_num)
            .bind(row.period)
            .bind(&row.clock)
            .bind(&row.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        mark_available(pool, &rows[0].game_id, FLAG_PLAY_BY_PLAY).await?;
        Ok(rows.len() as i64)
    }
}
