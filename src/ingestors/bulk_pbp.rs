//! Bulk pre-assembled play-by-play: covers games old enough that the
//! stats API's per-game PBP endpoint (era-gated to 1996) has no record,
//! pulled from a single historical archive instead. Unrestricted era --
//! the archive itself only contains games the stats API can't serve, so
//! there is no overlapping window to gate against. Stage 0.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::bulk_archive::BulkArchiveClient;
use crate::validation::{FieldError, RowValidation};

pub struct BulkPlayByPlayRow {
    pub game_id: String,
    pub event_num: i32,
    pub period: i32,
    pub clock: String,
    pub description: String,
}

pub struct BulkPbpIngestor {
    client: BulkArchiveClient,
    ctx: FetchContext,
    archive_url: String,
}

impl BulkPbpIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: BulkArchiveClient::new(),
            ctx: contexts.bulk.clone(),
            archive_url: "https://archive.nba.example/bulk/pre_modern_pbp.zip".to_string(),
        }
    }
}

#[async_trait]
impl Ingestor for BulkPbpIngestor {
    type Row = BulkPlayByPlayRow;

    fn entity_kind(&self) -> &'static str {
        "bulk_pbp"
    }

    fn source_name(&self) -> &'static str {
        "bulk"
    }

    async fn fetch(&self, _entity_id: &str, kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        let url = kwargs.source_url.as_deref().unwrap_or(&self.archive_url);
        let (_dir, paths) = self.client.download_and_extract(&self.ctx, url).await?;
        let Some(csv_path) = paths.iter().find(|p| p.extension().is_some_and(|e| e == "csv")) else {
            return Ok(None);
        };
        let bytes = std::fs::read(csv_path).map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
        let text = String::from_utf8(bytes).map_err(|e| IngestError::ValidationFailedPayload(e.to_string()))?;
        Ok(Some(Value::String(text)))
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let csv_text = raw
            .as_str()
            .ok_or_else(|| IngestError::ValidationFailedPayload("expected csv text payload".into()))?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_text.as_bytes());
        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| IngestError::ValidationFailedPayload(format!("malformed csv row: {e}")))?;
            let row_value = Value::String(record.iter().collect::<Vec<_>>().join(","));
            match parse_record(&record) {
                Ok(row) => valid.push(row),
                Err(e) => {
                    let mut v = RowValidation::default();
                    v.push(e.field, e.message);
                    rejected.push((row_value, v));
                }
            }
        }
        Ok(ValidatedBatch { valid, rejected })
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, cancel: &CancellationToken) -> Result<i64, IngestError> {
        let mut total = 0i64;
        for chunk in rows.chunks(crate::ingestors::BULK_BATCH_SIZE) {
            let mut seen_games = HashSet::new();
            for row in chunk {
                if seen_games.insert(row.game_id.clone()) {
                    require_parent_exists(pool, "games", "game_id", &row.game_id).await?;
                }
            }
            let mut tx = pool.begin().await?;
            for row in chunk {
                sqlx::query(
                    "INSERT INTO play_by_play_events (game_id, event_num, period, clock, description) \
                     VALUES (?, ?, ?, ?, ?) \
                     ON CONFLICT (game_id, event_num) DO UPDATE SET description = excluded.description",
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
            for game_id in &seen_games {
                crate::ingestors::games::mark_available(pool, game_id, crate::ingestors::games::FLAG_PLAY_BY_PLAY).await?;
            }
            total += chunk.len() as i64;
            if cancel.is_cancelled() {
                break;
            }
        }
        Ok(total)
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<BulkPlayByPlayRow, FieldError> {
    let game_id = record
        .get(0)
        .filter(|s| s.len() == 10)
        .ok_or_else(|| FieldError::new("game_id", "missing or not a 10-character game id"))?;
    let event_num = record
        .get(1)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("event_num", "missing or not an integer"))?;
    let period = record
        .get(2)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("period", "missing or not an integer"))?;
    let clock = record.get(3).filter(|s| !s.is_empty()).ok_or_else(|| FieldError::new("clock", "missing"))?;
    let description = record
        .get(4)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FieldError::new("description", "missing"))?;
    Ok(BulkPlayByPlayRow {
        game_id: game_id.to_string(),
        event_num,
        period,
        clock: clock.to_string(),
        description: description.to_string(),
    })
}
