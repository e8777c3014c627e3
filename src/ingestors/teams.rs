//! Teams (per-season): a team row is franchise + season scoped, since a
//! franchise's team_id, city, and name can differ season to season.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_positive_id, require_str, FieldError, RowValidation};

pub struct TeamRow {
    pub team_id: i64,
    pub franchise_id: String,
    pub season_id: i32,
    pub city: String,
    pub name: String,
}

pub struct TeamsIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl TeamsIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for TeamsIngestor {
    type Row = TeamRow;

    fn entity_kind(&self) -> &'static str {
        "teams"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        let season = kwargs.season.as_deref().unwrap_or_default();
        self.client
            .get_json(&self.ctx, "teams", &[("team_id", entity_id), ("season", season)])
            .await
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
            require_parent_exists(pool, "franchises", "franchise_id", &row.franchise_id).await?;
            require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO teams (team_id, franchise_id, season_id, city, name) VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (team_id, season_id) DO UPDATE SET city = excluded.city, name = excluded.name",
            )
            .bind(row.team_id)
            .bind(&row.franchise_id)
            .bind(row.season_id)
            .bind(&row.city)
            .bind(&row.name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

fn parse(raw: &Value) -> Result<TeamRow, FieldError> {
    let season_label = require_str(raw, "season")?;
    let season_id = season_label
        .split('-')
        .next()
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("season", "not a parseable season label"))?;
    Ok(TeamRow {
        team_id: require_positive_id(raw, "team_id")?,
        franchise_id: require_str(raw, "franchise_id")?.to_string(),
        season_id,
        city: require_str(raw, "city")?.to_string(),
        name: require_str(raw, "name")?.to_string(),
    })
}
