//! Team advanced metrics (net rating, pace) for one team-season. Era-gated
//! to 1996, same as the rest of the stats-API box score family. Stage 2.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::era_gate::{self, EraFamily};
use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_positive_id, FieldError, RowValidation};

pub struct TeamAdvancedRow {
    pub team_id: i64,
    pub season_id: i32,
    pub net_rating: f64,
    pub pace: f64,
}

pub struct TeamAdvancedIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl TeamAdvancedIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for TeamAdvancedIngestor {
    type Row = TeamAdvancedRow;

    fn entity_kind(&self) -> &'static str {
        "team_advanced"
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

    async fn fetch(&self, entity_id: &str, kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        let season = kwargs.season.as_deref().unwrap_or_default();
        self.client
            .get_json(&self.ctx, "teams/advanced", &[("team_id", entity_id), ("season", season)])
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
            require_parent_exists(pool, "teams", "team_id", &row.team_id.to_string()).await?;
            require_parent_exists(pool, "seasons", "season_id", &row.season_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO team_advanced_stats (team_id, season_id, net_rating, pace) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (team_id, season_id) DO UPDATE SET \
                    net_rating = excluded.net_rating, pace = excluded.pace",
            )
            .bind(row.team_id)
            .bind(row.season_id)
            .bind(row.net_rating)
            .bind(row.pace)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

fn parse(raw: &Value) -> Result<TeamAdvancedRow, FieldError> {
    let season_label = raw
        .get("season")
        .and_then(Value::as_str)
        .ok_or_else(|| FieldError::new("season", "missing"))?;
    let season_id = season_label
        .split('-')
        .next()
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| FieldError::new("season", "not a parseable season label"))?;
    Ok(TeamAdvancedRow {
        team_id: require_positive_id(raw, "team_id")?,
        season_id,
        net_rating: raw
            .get("net_rating")
            .and_then(Value::as_f64)
            .ok_or_else(|| FieldError::new("net_rating", "missing or not a number"))?,
        pace: raw
            .get("pace")
            .and_then(Value::as_f64)
            .ok_or_else(|| FieldError::new("pace", "missing or not a number"))?,
    })
}
