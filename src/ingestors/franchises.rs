//! Franchises: foundation rows, stage 1. One row per franchise (stable
//! across relocations/renames -- a `team_id` changes between seasons, a
//! `franchise_id` does not).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_str, FieldError};

pub struct FranchiseRow {
    pub franchise_id: String,
    pub league_id: String,
    pub name: String,
}

pub struct FranchisesIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl FranchisesIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for FranchisesIngestor {
    type Row = FranchiseRow;

    fn entity_kind(&self) -> &'static str {
        "franchises"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        self.client
            .get_json(&self.ctx, "franchises", &[("franchise_id", entity_id)])
            .await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        Ok(match parse(&raw) {
            Ok(row) => ValidatedBatch::all_valid(vec![row]),
            Err(e) => {
                let mut v = crate::validation::RowValidation::default();
                v.push(e.field, e.message);
                ValidatedBatch {
                    valid: Vec::new(),
                    rejected: vec![(raw, v)],
                }
            }
        })
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO franchises (franchise_id, league_id, name) VALUES (?, ?, ?) \
                 ON CONFLICT (franchise_id) DO UPDATE SET name = excluded.name",
            )
            .bind(&row.franchise_id)
            .bind(&row.league_id)
            .bind(&row.name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

fn parse(raw: &Value) -> Result<FranchiseRow, FieldError> {
    Ok(FranchiseRow {
        franchise_id: require_str(raw, "franchise_id")?.to_string(),
        league_id: require_str(raw, "league_id")?.to_string(),
        name: require_str(raw, "name")?.to_string(),
    })
}
