//! Seasons: foundation rows, one per `"YYYY-YY"` label, no FK dependency
//! beyond the (externally seeded) league row. Stage 1 of the backfill.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::ingestor::{FetchContext, Ingestor, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_iso_date, require_str, FieldError, RowValidation};

pub struct SeasonRow {
    pub season_id: i32,
    pub label: String,
    pub league_id: String,
    pub start_date: String,
}

pub struct SeasonsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl SeasonsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for SeasonsIngestor {
    type Row = SeasonRow;

    fn entity_kind(&self) -> &'static str {
        "seasons"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(
        &self,
        entity_id: &str,
        _kwargs: &crate::ingestor::Kwargs,
    ) -> Result<Option<Value>, IngestError> {
        self.client
            .get_json(&self.ctx, "seasons", &[("season", entity_id)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        match parse_season_row(&raw) {
            Ok(row) => Ok(ValidatedBatch::all_valid(vec![row])),
            Err(e) => {
                let mut validation = RowValidation::default();
                validation.push(e.field, e.message);
                Ok(ValidatedBatch {
                    valid: Vec::new(),
                    rejected: vec![(raw, validation)],
                })
            }
        }
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO seasons (season_id, label, league_id, start_date) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (season_id) DO UPDATE SET label = excluded.label, start_date = excluded.start_date",
            )
            .bind(row.season_id)
            .bind(&row.label)
            .bind(&row.league_id)
            .bind(&row.start_date)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

fn parse_season_row(raw: &Value) -> Result<SeasonRow, FieldError> {
    let label = require_str(raw, "label")?.to_string();
    let league_id = require_str(raw, "league_id")?.to_string();
    let start_date = require_iso_date(raw, "start_date")?.to_string();
    let season_id = label
        .split('-')
        .next()
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("label", "not a parseable season label"))?;
    Ok(SeasonRow {
        season_id,
        label,
        league_id,
        start_date,
    })
}
