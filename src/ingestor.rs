//! The three-stage `fetch -> validate -> upsert` contract every ingestor
//! implements, plus the base `ingest()` orchestration that composes them:
//! retries around fetch, quarantine for rejected rows, an audit row on
//! every exit path, and the terminal status returned to the caller. One
//! `ingest()` call handles one entity id, so every entity gets its own
//! audit row rather than one pass/fail per provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::audit::{self, AuditStatus};
use crate::cache::ResponseCache;
use crate::config::RetryConfig;
use crate::errors::IngestError;
use crate::quarantine::Quarantine;
use crate::rate_limiter::RateLimiter;
use crate::retry::retry_with_backoff;
use crate::validation::RowValidation;

/// Recognized kwargs across every ingestor family. Unknown keys are simply
/// never read; conflicting keys are the concrete ingestor's responsibility
/// to reject up front.
#[derive(Debug, Clone, Default)]
pub struct Kwargs {
    pub season: Option<String>,
    pub season_type: Option<String>,
    pub team_id: Option<i64>,
    pub scope: Option<String>,
    pub source_url: Option<String>,
    pub source: Option<String>,
}

impl Kwargs {
    /// The season's start year, e.g. 2015 for "2015-16". Used by era-gated
    /// ingestors; `None` if no season kwarg was supplied.
    pub fn season_year(&self) -> Option<i32> {
        self.season
            .as_deref()
            .and_then(|s| s.split('-').next())
            .and_then(|y| y.parse::<i32>().ok())
    }
}

/// Shared, process-wide infrastructure handed to every ingestor instance
/// the registry creates, scoped to that ingestor's source family.
#[derive(Clone)]
pub struct FetchContext {
    pub rate_limiter: RateLimiter,
    pub cache: Option<ResponseCache>,
    pub http: reqwest::Client,
}

/// The validated output of one `fetch()` call: rows that passed their
/// schema, and rows that didn't (with their field-level errors) so the
/// base `ingest()` can quarantine them without `validate()` itself doing
/// any I/O.
pub struct ValidatedBatch<Row> {
    pub valid: Vec<Row>,
    pub rejected: Vec<(Value, RowValidation)>,
}

impl<Row> ValidatedBatch<Row> {
    pub fn all_valid(valid: Vec<Row>) -> Self {
        Self {
            valid,
            rejected: Vec::new(),
        }
    }

    /// Splits `raw[list_field]` (an array) into validated rows, applying
    /// `parse` to each element. The common shape for list-valued
    /// responses: box scores, play-by-play events, shot charts, and the
    /// like all arrive as `{ "<list_field>": [ {...}, {...} ] }`.
    pub fn from_list_field(
        raw: &Value,
        list_field: &str,
        parse: impl Fn(&Value) -> Result<Row, crate::validation::FieldError>,
    ) -> Self {
        let items = raw
            .get(list_field)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut valid = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();
        for item in items {
            match parse(&item) {
                Ok(row) => valid.push(row),
                Err(e) => {
                    let mut validation = RowValidation::default();
                    validation.push(e.field, e.message);
                    rejected.push((item, validation));
                }
            }
        }
        Self { valid, rejected }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IngestStatus {
    Success,
    Empty,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub status: IngestStatus,
    pub entity_id: String,
    pub rows_affected: i64,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait Ingestor: Send + Sync {
    type Row: Send;

    /// A stable, unique string identifier, e.g. "players" or "box_scores_traditional".
    fn entity_kind(&self) -> &'static str;

    /// The source family name this ingestor's data comes from, e.g. "stats_api".
    fn source_name(&self) -> &'static str;

    /// Era-gate check. Default: unrestricted. Gated ingestors look up
    /// `kwargs.season_year()` against their family in `era_gate::check`.
    fn era_check(&self, _kwargs: &Kwargs) -> Result<(), IngestError> {
        Ok(())
    }

    /// Network or file read. May consult the cache and the rate limiter via
    /// the `FetchContext` the concrete ingestor was constructed with.
    /// Returns `Ok(None)` for "source reached, nothing to return" (audit
    /// `EMPTY`); `Err` for anything else.
    async fn fetch(&self, entity_id: &str, kwargs: &Kwargs) -> Result<Option<Value>, IngestError>;

    /// Pure: coerces and validates the raw payload into row models. `Err`
    /// means the whole payload's shape was unrecognized (audit `FAILED`);
    /// `Ok` carries per-row pass/fail via `ValidatedBatch`.
    fn validate(&self, raw: Value) -> Result<ValidatedBatch<Self::Row>, IngestError>;

    /// Transactional: FK-prechecks, issues idempotent upserts, commits.
    /// Returns the attempted-upsert count (spec: "rows_affected" reflects
    /// upserts attempted, not net rows inserted). Bulk ingestors check
    /// `cancel` between batch commits and stop after committing the
    /// in-flight batch; per-entity ingestors can ignore it.
    async fn upsert(&self, rows: &[Self::Row], pool: &SqlitePool, cancel: &CancellationToken) -> Result<i64, IngestError>;

    /// Composes fetch/validate/upsert, writes the audit row on every exit
    /// path, and returns the terminal result. Not overridden by concrete
    /// ingestors.
    #[instrument(skip(self, pool, quarantine, retry, cancel), fields(entity_kind = self.entity_kind(), entity_id))]
    async fn ingest(
        &self,
        entity_id: &str,
        pool: &SqlitePool,
        quarantine: &Quarantine,
        retry: &RetryConfig,
        kwargs: Kwargs,
        cancel: &CancellationToken,
    ) -> IngestResult {
        let entity_kind = self.entity_kind();
        let source = self.source_name();

        if let Err(err) = self.era_check(&kwargs) {
            info!(%err, "era gate rejected ingest, no I/O performed");
            return self
                .finish(pool, entity_id, source, IngestStatus::Skipped, 0, Some(err.to_string()))
                .await;
        }

        if cancel.is_cancelled() {
            return self
                .finish(pool, entity_id, source, IngestStatus::Failed, 0, Some(IngestError::Cancelled.to_string()))
                .await;
        }

        let fetch_outcome = retry_with_backoff(retry, || self.fetch(entity_id, &kwargs)).await;
        let raw = match fetch_outcome {
            Ok(None) => {
                return self
                    .finish(pool, entity_id, source, IngestStatus::Empty, 0, None)
                    .await;
            }
            Err(err) => {
                warn!(%err, "fetch failed terminally");
                return self
                    .finish(pool, entity_id, source, IngestStatus::Failed, 0, Some(err.to_string()))
                    .await;
            }
            Ok(Some(raw)) => raw,
        };

        let batch = match self.validate(raw) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(%err, "payload-level validation failure");
                return self
                    .finish(pool, entity_id, source, IngestStatus::Failed, 0, Some(err.to_string()))
                    .await;
            }
        };

        for (payload, validation) in &batch.rejected {
            if let Err(err) = quarantine.record(entity_kind, payload, validation).await {
                warn!(%err, "failed to write quarantine record");
            }
        }

        if cancel.is_cancelled() {
            return self
                .finish(pool, entity_id, source, IngestStatus::Failed, 0, Some(IngestError::Cancelled.to_string()))
                .await;
        }

        match self.upsert(&batch.valid, pool, cancel).await {
            Ok(rows_affected) => {
                self.finish(pool, entity_id, source, IngestStatus::Success, rows_affected, None)
                    .await
            }
            Err(err) => {
                warn!(%err, "upsert failed");
                self.finish(pool, entity_id, source, IngestStatus::Failed, 0, Some(err.to_string()))
                    .await
            }
        }
    }

    /// Writes the audit row in its own transaction and assembles the
    /// result dict. Kept private-by-convention (not part of the public
    /// contract concrete ingestors override).
    async fn finish(
        &self,
        pool: &SqlitePool,
        entity_id: &str,
        source: &str,
        status: IngestStatus,
        rows_affected: i64,
        error_message: Option<String>,
    ) -> IngestResult {
        let audit_status = match status {
            IngestStatus::Success => AuditStatus::Success,
            IngestStatus::Empty => AuditStatus::Empty,
            IngestStatus::Failed => AuditStatus::Failed,
            IngestStatus::Skipped => AuditStatus::Skipped,
        };
        if let Err(err) = audit::write(
            pool,
            self.entity_kind(),
            entity_id,
            source,
            audit_status,
            rows_affected,
            error_message.as_deref(),
        )
        .await
        {
            warn!(%err, "failed to write audit row");
        }
        IngestResult {
            status,
            entity_id: entity_id.to_string(),
            rows_affected,
            error_message,
        }
    }
}

/// Acquires a rate-limiter token and performs an HTTP GET, the shared shape
/// every cached/rate-limited source adapter uses. Cache lookups precede
/// rate-limit acquisition -- callers check the cache themselves before
/// calling this.
pub async fn rate_limited_get(ctx: &FetchContext, url: &str) -> Result<reqwest::Response, IngestError> {
    ctx.rate_limiter.acquire().await;
    ctx.http
        .get(url)
        .send()
        .await
        .map_err(|e| classify_reqwest_error(&e))
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> IngestError {
    if err.is_timeout() || err.is_connect() {
        IngestError::TransientNetwork(err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(status)
    } else {
        IngestError::TransientNetwork(err.to_string())
    }
}

/// HTTP 429 and 5xx classify as retry; other 4xx as fatal. Anything else
/// (an unrecognized status outside 2xx/4xx/5xx/429) also retries, on the
/// theory that it's more likely a transient intermediary than a
/// permanent rejection.
pub fn classify_status(status: reqwest::StatusCode) -> IngestError {
    if status.as_u16() == 429 || status.is_server_error() {
        IngestError::RateLimited
    } else if status.is_client_error() {
        IngestError::Other(anyhow::anyhow!("http {status}"))
    } else {
        IngestError::TransientNetwork(format!("unexpected status {status}"))
    }
}

pub type ArcIngestor<R> = Arc<dyn Ingestor<Row = R>>;

/// One `FetchContext` per source family, built once at startup and shared
/// by every ingestor instance the registry creates. Cheap to clone --
/// `FetchContext` itself only clones an `Arc`-backed rate limiter, an
/// optional cache handle, and a `reqwest::Client` (itself `Arc`-backed).
#[derive(Clone)]
pub struct SourceContexts {
    pub stats_api: FetchContext,
    pub html_archive: FetchContext,
    pub scraper: FetchContext,
    pub bulk: FetchContext,
}

impl SourceContexts {
    /// Builds one context per source family from `config`. The scraper
    /// family (live injury reports) never gets a cache handle -- that
    /// source is non-idempotent and caching it would serve stale injury
    /// statuses indefinitely.
    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cached = |source: &str| ResponseCache::new(config.cache_dir(source));

        Ok(Self {
            stats_api: FetchContext {
                rate_limiter: RateLimiter::new(crate::config::STATS_API_RATE),
                cache: Some(cached("stats_api")),
                http: http.clone(),
            },
            html_archive: FetchContext {
                rate_limiter: RateLimiter::new(crate::config::HTML_ARCHIVE_RATE),
                cache: Some(cached("html_archive")),
                http: http.clone(),
            },
            scraper: FetchContext {
                rate_limiter: RateLimiter::new(crate::config::SCRAPER_RATE),
                cache: None,
                http: http.clone(),
            },
            bulk: FetchContext {
                rate_limiter: RateLimiter::new(crate::config::BULK_RATE),
                cache: Some(cached("bulk")),
                http,
            },
        })
    }
}

/// Type-erased façade over `Ingestor<Row = _>` so the registry can hold
/// ingestors of different row types behind one trait object. Concrete
/// ingestors never implement this directly -- they implement `Ingestor`
/// and get `DynIngestor` for free via the blanket impl below.
#[async_trait]
pub trait DynIngestor: Send + Sync {
    fn entity_kind(&self) -> &'static str;
    fn source_name(&self) -> &'static str;

    async fn ingest_dyn(
        &self,
        entity_id: &str,
        pool: &SqlitePool,
        quarantine: &Quarantine,
        retry: &RetryConfig,
        kwargs: Kwargs,
        cancel: &CancellationToken,
    ) -> IngestResult;
}

#[async_trait]
impl<T> DynIngestor for T
where
    T: Ingestor,
{
    fn entity_kind(&self) -> &'static str {
        Ingestor::entity_kind(self)
    }

    fn source_name(&self) -> &'static str {
        Ingestor::source_name(self)
    }

    async fn ingest_dyn(
        &self,
        entity_id: &str,
        pool: &SqlitePool,
        quarantine: &Quarantine,
        retry: &RetryConfig,
        kwargs: Kwargs,
        cancel: &CancellationToken,
    ) -> IngestResult {
        Ingestor::ingest(self, entity_id, pool, quarantine, retry, kwargs, cancel).await
    }
}
