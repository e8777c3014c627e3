//! Bulk ELO ratings: one pre-assembled archive covering the league's full
//! history, re-downloaded wholesale on each backfill run rather than
//! incrementally. Unrestricted era (the archive itself predates the
//! franchise era this crate otherwise gates on). Stage 0.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::bulk_archive::BulkArchiveClient;
use crate::validation::{FieldError, RowValidation};

pub struct EloRatingRow {
    pub franchise_id: String,
    pub season_id: i32,
    pub elo_rating: f64,
}

pub struct BulkEloIngestor {
    client: BulkArchiveClient,
    ctx: FetchContext,
    archive_url: String,
}

impl BulkEloIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: BulkArchiveClient::new(),
            ctx: contexts.bulk.clone(),
            archive_url: "https://archive.nba.example/bulk/elo_ratings.zip".to_string(),
        }
    }
}

#[async_trait]
impl Ingestor for BulkEloIngestor {
    type Row = EloRatingRow;

    fn entity_kind(&self) -> &'static str {
        "bulk_elo"
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
            for row in chunk {
                require_parent_exists(pool, "franchises", "franchise_id", &row.franchise_id).await?;
                require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
            }
            let mut tx = pool.begin().await?;
            for row in chunk {
                sqlx::query(
                    "INSERT INTO elo_ratings (franchise_id, season_id, elo_rating) VALUES (?, ?, ?) \
                     ON CONFLICT (franchise_id, season_id) DO UPDATE SET elo_rating = excluded.elo_rating",
                )
                .bind(&row.franchise_id)
                .bind(row.season_id)
                .bind(row.elo_rating)
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

fn parse_record(record: &csv::StringRecord) -> Result<EloRatingRow, FieldError> {
    let franchise_id = record
        .get(0)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FieldError::new("franchise_id", "missing"))?;
    let season_id = record
        .get(1)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("season_id", "missing or not an integer"))?;
    let elo_rating = record
        .get(2)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| FieldError::new("elo_rating", "missing or not a number"))?;
    Ok(EloRatingRow {
        franchise_id: franchise_id.to_string(),
        season_id,
        elo_rating,
    })
}
