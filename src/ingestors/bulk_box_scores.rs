//! Bulk pre-modern box scores: covers games before the stats API's
//! traditional box score endpoint has coverage (era-gated to 1996),
//! sourced from a single historical archive instead. Unrestricted era for
//! the same reason as `bulk_pbp`. Stage 0.

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

pub struct BulkBoxScoreRow {
    pub game_id: String,
    pub player_id: i64,
    pub team_id: i64,
    pub points: i64,
    pub rebounds: i64,
    pub assists: i64,
}

pub struct BulkBoxScoresIngestor {
    client: BulkArchiveClient,
    ctx: FetchContext,
    archive_url: String,
}

impl BulkBoxScoresIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: BulkArchiveClient::new(),
            ctx: contexts.bulk.clone(),
            archive_url: "https://archive.nba.example/bulk/pre_modern_box_scores.zip".to_string(),
        }
    }
}

#[async_trait]
impl Ingestor for BulkBoxScoresIngestor {
    type Row = BulkBoxScoreRow;

    fn entity_kind(&self) -> &'static str {
        "bulk_box_scores"
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
                require_parent_exists(pool, "players", "player_id", &row.player_id.to_string()).await?;
                require_parent_exists(pool, "teams", "team_id", &row.team_id.to_string()).await?;
            }
            let mut tx = pool.begin().await?;
            for row in chunk {
                sqlx::query(
                    "INSERT INTO box_score_traditional (game_id, player_id, team_id, points, rebounds, assists, minutes) \
                     VALUES (?, ?, ?, ?, ?, ?, 0) \
                     ON CONFLICT (game_id, player_id) DO UPDATE SET \
                        points = excluded.points, rebounds = excluded.rebounds, assists = excluded.assists",
                )
                .bind(&row.game_id)
                .bind(row.player_id)
                .bind(row.team_id)
                .bind(row.points)
                .bind(row.rebounds)
                .bind(row.assists)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            for game_id in &seen_games {
                crate::ingestors::games::mark_available(pool, game_id, crate::ingestors::games::FLAG_BOX_TRADITIONAL).await?;
            }
            total += chunk.len() as i64;
            if cancel.is_cancelled() {
                break;
            }
        }
        Ok(total)
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<BulkBoxScoreRow, FieldError> {
    let game_id = record
        .get(0)
        .filter(|s| s.len() == 10)
        .ok_or_else(|| FieldError::new("game_id", "missing or not a 10-character game id"))?;
    let player_id = record
        .get(1)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| FieldError::new("player_id", "missing or not an integer"))?;
    let team_id = record
        .get(2)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| FieldError::new("team_id", "missing or not an integer"))?;

    let parse_count = |idx: usize, field: &'static str| -> Result<i64, FieldError> {
        let value = record
            .get(idx)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| FieldError::new(field, "missing or not an integer"))?;
        if value < 0 {
            return Err(FieldError::new(field, "negative counts are not valid"));
        }
        Ok(value)
    };

    Ok(BulkBoxScoreRow {
        game_id: game_id.to_string(),
        player_id,
        team_id,
        points: parse_count(3, "points")?,
        rebounds: parse_count(4, "rebounds")?,
        assists: parse_count(5, "assists")?,
    })
}
