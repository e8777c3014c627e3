//! Filesystem response cache keyed by a fingerprint over `(endpoint, params)`.
//!
//! Writes are atomic: the body lands in a tempfile in the same directory and
//! is renamed into place, so a reader never observes a partial write and a
//! concurrent writer racing for the same key is safe (last writer wins).
//! Cache lookups never touch the rate limiter or the network.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Deterministic fingerprint over an endpoint id and its canonicalized params.
/// Params must already be in a stable order -- callers sort/normalize before
/// calling this so that logically identical requests fingerprint identically.
pub fn fingerprint(endpoint_id: &str, canonical_params: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical_params.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct ResponseCache {
    root: PathBuf,
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, source: &str, key: &str) -> PathBuf {
        self.root.join(source).join(key)
    }

    /// Read-through lookup. Returns `None` on a cold cache or any I/O error
    /// (a corrupted/missing cache entry should never fail an ingest -- it
    /// just falls through to a live fetch).
    pub async fn get(&self, source: &str, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(source, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(source, key, "cache hit");
                Some(bytes)
            }
            Err(_) => None,
        }
    }

    /// Write-then-rename. Creates the source bucket directory if needed.
    pub async fn put(&self, source: &str, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let dir = self.root.join(source);
        tokio::fs::create_dir_all(&dir).await?;
        let final_path = dir.join(key);

        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            let tmp_path = tmp.path().to_path_buf();
            move || std::fs::write(tmp_path, bytes)
        })
        .await??;
        persist(tmp, &final_path)?;
        debug!(source, key, "cache write");
        Ok(())
    }

    /// Removes cache entries under `source` whose file modification time is
    /// older than `max_age`. Used by the orchestrator's cache-pruning
    /// maintenance step; never called mid-ingest.
    pub async fn prune_older_than(&self, source: &str, max_age: std::time::Duration) -> usize {
        let dir = self.root.join(source);
        let mut pruned = 0usize;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(_) => return 0,
        };
        let cutoff = std::time::SystemTime::now() - max_age;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                if let Ok(modified) = meta.modified() {
                    if modified < cutoff && tokio::fs::remove_file(entry.path()).await.is_ok() {
                        pruned += 1;
                    }
                }
            }
        }
        pruned
    }
}

fn persist(tmp: tempfile::NamedTempFile, dest: &Path) -> anyhow::Result<()> {
    tmp.persist(dest)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("cache persist failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let key = fingerprint("players", "season=2019-20");

        assert!(cache.get("stats_api", &key).await.is_none());
        cache.put("stats_api", &key, b"payload").await.unwrap();
        assert_eq!(cache.get("stats_api", &key).await.unwrap(), b"payload");
    }

    #[test]
    fn fingerprint_is_deterministic_and_order_sensitive_on_input() {
        let a = fingerprint("games", "season=2020-21&team_id=5");
        let b = fingerprint("games", "season=2020-21&team_id=5");
        let c = fingerprint("games", "team_id=5&season=2020-21");
        assert_eq!(a, b);
        assert_ne!(a, c, "caller must canonicalize param order before hashing");
    }
}
