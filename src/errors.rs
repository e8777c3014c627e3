//! The ingestion error taxonomy: one variant per distinct kind/origin/
//! propagation combination an ingestor can hit. `Display` renders the
//! `error_message` that lands in the audit row; call sites should never
//! hand-build that string with `format!`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("era_not_supported: {family}<{first_allowed}")]
    EraNotSupported {
        family: &'static str,
        first_allowed: i32,
    },

    #[error("rate_limited")]
    RateLimited,

    #[error("transient_network: {0}")]
    TransientNetwork(String),

    #[error("source_empty")]
    SourceEmpty,

    #[error("validation_failed: {0}")]
    ValidationFailedPayload(String),

    #[error("missing_fk({table},{column},{value})")]
    MissingFk {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    #[error("integrity_violation: {0}")]
    IntegrityViolation(String),

    #[error("not_implemented")]
    NotImplemented,

    #[error("cancelled")]
    Cancelled,

    #[error("retry_exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How the retry harness should treat a fallible attempt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Retry-worthy: transient, loop until `max_attempts`.
    Retry,
    /// Propagate immediately, no further attempts.
    Fatal,
    /// Reached the source successfully; there was nothing to return.
    Empty,
}

impl IngestError {
    /// Classifies an error for the retry harness: era gate, FK,
    /// not-implemented and validation are fatal; rate limits and transient
    /// network errors are retryable; source-empty is its own terminal
    /// sentinel.
    pub fn classify(&self) -> Classification {
        match self {
            IngestError::RateLimited | IngestError::TransientNetwork(_) => Classification::Retry,
            IngestError::SourceEmpty => Classification::Empty,
            _ => Classification::Fatal,
        }
    }
}
