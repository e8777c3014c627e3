//! The relational store: a pooled connection to the local SQLite database,
//! tuned on connect: WAL journaling, foreign keys on, synchronous NORMAL,
//! a generous page cache, 16 KB pages.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
}

impl Store {
    #[instrument(skip(path))]
    pub async fn connect(path: &std::path::Path, max_connections: u32) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .page_size(16384)
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL")
            .pragma("cache_size", "-64000")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(connect_options)
            .await?;

        info!("connected to store");
        Ok(Self { pool })
    }

    /// An in-memory store for tests; each connection to this pool shares the
    /// same in-memory database as long as the pool stays alive.
    pub async fn connect_in_memory() -> anyhow::Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        Ok(Self { pool })
    }
}
