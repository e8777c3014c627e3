//! Player tracking (speed, distance covered, touches): era-gated to 2013,
//! the first season the optical tracking system was deployed league-wide.
//! Stage 4 (per-player).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::require_positive_id;

pub struct TrackingRow {
    pub player_id: i64,
    pub season_id: i32,
    pub avg_speed_mph: f64,
    pub distance_miles: f64,
    pub touches: i64,
}

pub struct TrackingIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl TrackingIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for TrackingIngestor {
    type Row = TrackingRow;

    fn entity_kind(&self) -> &'static str {
        "tracking"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    fn era_check(&self, kwargs: &Kwargs) -> Result<(), IngestError> {
        match kwargs.season_year() {
            Some(year) => era_gate::check(EraFamily::Tracking, year),
            None => Ok(()),
        }
    }

    async fn fetch(&self, entity_id: &str, kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        let season = kwargs.season.as_deref().unwrap_or_default();
        self.client
            .get_json(&self.ctx, "tracking", &[("player_id", entity_id), ("season", season)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let player_id = require_positive_id(&raw, "player_id")
            .map_err(|e| IngestError::ValidationFailedPayload(e.message))?;
        let season_label = raw
            .get("season")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::ValidationFailedPayload("missing season".into()))?;
        let season_id = season_label
            .split('-')
            .next()
            .and_then(|y| y.parse::<i32>().ok())
            .ok_or_else(|| IngestError::ValidationFailedPayload("season not parseable".into()))?;

        match parse_row(&raw, player_id, season_id) {
            Ok(row) => Ok(ValidatedBatch::all_valid(vec![row])),
            Err(e) => {
                let mut v = crate::validation::RowValidation::default();
                v.push(e.field, e.message);
                Ok(ValidatedBatch {
                    valid: Vec::new(),
                    rejected: vec![(raw, v)],
                })
            }
        }
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        for row in rows {
            require_parent_exists(pool, "players", "player_id", &row.player_id.to_string()).await?;
            require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO tracking_season_stats (player_id, season_id, avg_speed_mph, distance_miles, touches) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (player_id, season_id) DO UPDATE SET \
                    avg_speed_mph = excluded.avg_speed_mph, distance_miles = excluded.distance_miles, \
                    touches = excluded.touches",
            )
            .bind(row.player_id)
            .bind(row.season_id)
            .bind(row.avg_speed_mph)
            .bind(row.distance_miles)
            .bind(row.touches)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

fn parse_row(raw: &Value, player_id: i64, season_id: i32) -> Result<TrackingRow, crate::validation::FieldError> {
    Ok(TrackingRow {
        player_id,
        season_id,
        avg_speed_mph: raw
            .get("avg_speed_mph")
            .and_then(Value::as_f64)
            .ok_or_else(|| crate::validation::FieldError::new("avg_speed_mph", "missing or not a number"))?,
        distance_miles: raw
            .get("distance_miles")
            .and_then(Value::as_f64)
            .ok_or_else(|| crate::validation::FieldError::new("distance_miles", "missing or not a number"))?,
        touches: crate::validation::require_non_negative_count(raw, "touches")?,
    })
}
