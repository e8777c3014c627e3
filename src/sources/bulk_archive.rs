//! Bulk archive client: downloads a versioned zip (RAPTOR ratings, pre-1996
//! box score dumps, historical play-by-play exports) and extracts its CSV
//! members to a temp directory for the calling ingestor to stream-read.
//! Effectively unrelated to the rate limiter in practice (one download per
//! backfill run) but still goes through `FetchContext` for consistency and
//! testability.

use std::io::Read;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::errors::IngestError;
use crate::ingestor::{rate_limited_get, FetchContext};

pub struct BulkArchiveClient;

impl BulkArchiveClient {
    pub fn new() -> Self {
        Self
    }

    /// Downloads the zip at `url` and extracts every member into a fresh
    /// temp directory, returning the paths of the extracted files. The
    /// `TempDir` must be kept alive by the caller for as long as the paths
    /// are in use; it is removed on drop.
    pub async fn download_and_extract(
        &self,
        ctx: &FetchContext,
        url: &str,
    ) -> Result<(TempDir, Vec<PathBuf>), IngestError> {
        let response = rate_limited_get(ctx, url).await?;
        if !response.status().is_success() {
            return Err(crate::ingestor::classify_status(response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| crate::ingestor::classify_reqwest_error(&e))?;

        tokio::task::spawn_blocking(move || extract(&bytes))
            .await
            .map_err(|e| IngestError::Other(anyhow::anyhow!("extraction task panicked: {e}")))?
    }
}

fn extract(bytes: &[u8]) -> Result<(TempDir, Vec<PathBuf>), IngestError> {
    let dir = TempDir::new().map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
    let cursor = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| IngestError::ValidationFailedPayload(format!("bad zip archive: {e}")))?;

    let mut paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| IngestError::ValidationFailedPayload(format!("bad zip entry: {e}")))?;
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let dest = dir.path().join(name);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
        }
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
        std::fs::write(&dest, contents).map_err(|e| IngestError::Other(anyhow::anyhow!(e)))?;
        paths.push(dest);
    }
    Ok((dir, paths))
}

impl Default for BulkArchiveClient {
    fn default() -> Self {
        Self::new()
    }
}
