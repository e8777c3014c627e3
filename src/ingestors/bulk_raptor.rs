//! Bulk RAPTOR ratings: era-gated to 1976, the season RAPTOR's underlying
//! play-by-play inputs become reliable enough to compute from. Stage 0.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::bulk_archive::BulkArchiveClient;
use crate::validation::{FieldError, RowValidation};

pub struct RaptorRatingRow {
    pub player_id: i64,
    pub season_id: i32,
    pub raptor_offense: f64,
    pub raptor_defense: f64,
}

pub struct BulkRaptorIngestor {
    client: BulkArchiveClient,
    ctx: FetchContext,
    archive_url: String,
}

impl BulkRaptorIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: BulkArchiveClient::new(),
            ctx: contexts.bulk.clone(),
            archive_url: "https://archive.nba.example/bulk/raptor_ratings.zip".to_string(),
        }
    }
}

#[async_trait]
impl Ingestor for BulkRaptorIngestor {
    type Row = RaptorRatingRow;

    fn entity_kind(&self) -> &'static str {
        "bulk_raptor"
    }

    fn source_name(&self) -> &'static str {
        "bulk"
    }

    fn era_check(&self, kwargs: &Kwargs) -> Result<(), IngestError> {
        match kwargs.season_year() {
            Some(year) => era_gate::check(EraFamily::BulkRaptor, year),
            None => Ok(()),
        }
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
            for row in chunk {
                require_parent_exists(pool, "players", "player_id", &row.player_id.to_string()).await?;
                require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
            }
            let mut tx = pool.begin().await?;
            for row in chunk {
                sqlx::query(
                    "INSERT INTO raptor_ratings (player_id, season_id, raptor_offense, raptor_defense) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT (player_id, season_id) DO UPDATE SET \
                        raptor_offense = excluded.raptor_offense, raptor_defense = excluded.raptor_defense",
                )
                .bind(row.player_id)
                .bind(row.season_id)
                .bind(row.raptor_offense)
                .bind(row.raptor_defense)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            total += chunk.len() as i64;
            if cancel.is_cancelled() {
                break;
            }
        }
        Ok(total)
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<RaptorRatingRow, FieldError> {
    let player_id = record
        .get(0)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| FieldError::new("player_id", "missing or not an integer"))?;
    let season_id = record
        .get(1)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("season_id", "missing or not an integer"))?;
    let raptor_offense = record
        .get(2)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| FieldError::new("raptor_offense", "missing or not a number"))?;
    let raptor_defense = record
        .get(3)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| FieldError::new("raptor_defense", "missing or not a number"))?;
    Ok(RaptorRatingRow {
        player_id,
        season_id,
        raptor_offense,
        raptor_defense,
    })
}
