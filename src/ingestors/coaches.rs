//! Coaches: per-season assignment to a team. Stage 2.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::fk_precheck::require_parent_exists;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{require_positive_id, require_str};

pub struct CoachAssignmentRow {
    pub coach_id: i64,
    pub full_name: String,
    pub team_id: i64,
    pub season_id: i32,
    pub role: String,
}

pub struct CoachesIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl CoachesIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for CoachesIngestor {
    type Row = CoachAssignmentRow;

    fn entity_kind(&self) -> &'static str {
        "coaches"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        let season = kwargs.season.as_deref().unwrap_or(entity_id);
        self.client.get_json(&self.ctx, "coaches", &[("season", season)]).await
    }

    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        let season_id = raw
            .get("season")
            .and_then(Value::as_str)
            .and_then(|s| s.split('-').next())
            .and_then(|y| y.parse::<i32>().ok())
            .ok_or_else(|| IngestError::ValidationFailedPayload("season missing or unparseable".into()))?;

        Ok(ValidatedBatch::from_list_field(&raw, "coaches", move |item| {
            Ok(CoachAssignmentRow {
                coach_id: require_positive_id(item, "coach_id")?,
                full_name: require_str(item, "full_name")?.to_string(),
                team_id: require_positive_id(item, "team_id")?,
                season_id,
                role: require_str(item, "role")?.to_string(),
            })
        }))
    }

    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        for row in rows {
            require_parent_exists(pool, "teams", "team_id", &row.team_id.to_string()).await?;
        }
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO coaches (coach_id, full_name) VALUES (?, ?) \
                 ON CONFLICT (coach_id) DO UPDATE SET full_name = excluded.full_name",
            )
            .bind(row.coach_id)
            .bind(&row.full_name)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "INSERT INTO coach_assignments (coach_id, team_id, season_id, role) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (coach_id, team_id, season_id) DO UPDATE SET role = excluded.role",
            )
            .bind(row.coach_id)
            .bind(row.team_id)
            .bind(row.season_id)
            .bind(&row.role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}
