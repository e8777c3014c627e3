//! Resolved runtime configuration. Loading it from the environment is the
//! only "config loading" this crate does -- no file-based layering or
//! schema validation, just env vars with sane defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::util::env::{env_parse, store_path, vault_root};

/// Per-source-family rate limit: `burst` tokens refilled at `per_secs` each.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub burst: u32,
    pub refill_per_sec: f64,
}

impl RateLimitConfig {
    const fn new(burst: u32, refill_per_sec: f64) -> Self {
        Self {
            burst,
            refill_per_sec,
        }
    }
}

/// Per-family defaults: stats JSON ~8 req/min, HTML archive ~1 req/3s,
/// current-season scrapers ~1 req/2s, bulk downloads effectively unlimited.
pub const STATS_API_RATE: RateLimitConfig = RateLimitConfig::new(8, 8.0 / 60.0);
pub const HTML_ARCHIVE_RATE: RateLimitConfig = RateLimitConfig::new(1, 1.0 / 3.0);
pub const SCRAPER_RATE: RateLimitConfig = RateLimitConfig::new(1, 0.5);
pub const BULK_RATE: RateLimitConfig = RateLimitConfig::new(1_000, 1_000.0);

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: env_parse("NBA_VAULT_RETRY_MAX_ATTEMPTS", 5),
            base_delay: Duration::from_millis(env_parse("NBA_VAULT_RETRY_BASE_MS", 250)),
            jitter: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub vault_root: PathBuf,
    pub store_path: PathBuf,
    pub max_connections: u32,
    pub worker_pool_size: usize,
    pub retry: RetryConfig,
    pub bulk_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        crate::util::env::init_env();
        Self {
            vault_root: vault_root(),
            store_path: store_path(),
            max_connections: env_parse("NBA_VAULT_MAX_CONNECTIONS", 4),
            worker_pool_size: env_parse("NBA_VAULT_WORKERS", 4),
            retry: RetryConfig::default(),
            bulk_batch_size: env_parse("NBA_VAULT_BULK_BATCH_SIZE", 1_000),
        }
    }

    pub fn cache_dir(&self, source: &str) -> PathBuf {
        self.vault_root.join("cache").join(source)
    }

    pub fn quarantine_dir(&self, entity_kind: &str) -> PathBuf {
        self.vault_root.join("data").join("quarantine").join(entity_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_defaults_match_spec_table() {
        assert_eq!(STATS_API_RATE.burst, 8);
        assert!((HTML_ARCHIVE_RATE.refill_per_sec - 1.0 / 3.0).abs() < 1e-9);
    }
}
