//! Contracts: a stubbed ingestor. Contract data is licensed separately and
//! this crate has no access to it; all three contract methods raise
//! `not_implemented`. It is still registered so operators and the
//! orchestrator can enumerate it -- the orchestrator treats its failure as
//! expected and continues (design note: stubbed ingestor).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::ingestor::{Ingestor, Kwargs, SourceContexts, ValidatedBatch};

pub struct ContractRow;

pub struct ContractsIngestor;

impl ContractsIngestor {
    pub fn new(_contexts: &SourceContexts) -> Self {
        Self
    }
}

#[async_trait]
impl Ingestor for ContractsIngestor {
    type Row = ContractRow;

    fn entity_kind(&self) -> &'static str {
        "contracts"
    }

    fn source_name(&self) -> &'static str {
        "scraper"
    }

    async fn fetch(&self, _entity_id: &str, _kwargs: &Kwargs) -> Result<Option<Value>, IngestError> {
        Err(IngestError::NotImplemented)
    }

    fn validate(&self, _raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError> {
        Err(IngestError::NotImplemented)
    }

    async fn upsert(&self, _rows: &[Self::Row], _pool: &SqlitePool, _cancel: &CancellationToken) -> Result<i64, IngestError> {
        Err(IngestError::NotImplemented)
    }
}
