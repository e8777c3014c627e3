//! Players: foundation rows, no FK dependency of its own (it is the FK
//! *target* for most per-game and per-season child rows).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::ingestor::{FetchContext, Ingestor, Kwargs, SourceContexts, ValidatedBatch};
use crate::sources::stats_api::StatsApiClient;
use crate::validation::{optional_str, require_positive_id, require_str, FieldError, RowValidation};

pub struct PlayerRow {
    pub player_id: i64,
    pub full_name: String,
    pub birthdate: Option<String>,
}

pub struct PlayersIngestor {
    client: StatsApiClient,
    ctx: FetchContext,
}

impl PlayersIngestor {
    pub fn new(contexts: &SourceContexts) -> Self {
        Self {
            client: StatsApiClient::new("https://stats.nba.example/v1"),
            ctx: contexts.stats_api.clone(),
        }
    }
}

#[async_trait]
impl Ingestor for PlayersIngestor {
    type Row = PlayerRow;

    fn entity_kind(&self) -> &'static str {
        "players"
    }

    fn source_name(&self) -> &'static str {
        "stats_api"
    }

    async fn fetch(&self, entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        self.client
            .get_json(&self.ctx, "players", &[("player_id", entity_id)])
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
        let mut tx = pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO players (player_id, full_name, birthdate) VALUES (?, ?, ?) \
                 ON CONFLICT (player_id) DO UPDATE SET full_name = excluded.full_name, birthdate = excluded.birthdate",
            )
            .bind(row.player_id)
            .bind(&row.full_name)
            .bind(&row.birthdate)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as i64)
    }
}

fn parse(raw: &Value) -> Result<PlayerRow, FieldError> {
    Ok(PlayerRow {
        player_id: require_positive_id(raw, "player_id")?,
        full_name: require_str(raw, "full_name")?.to_string(),
        birthdate: optional_str(raw, "birthdate").map(str::to_string),
    })
}
