//! Write-only sink for rows that failed validation. The core never reads
//! these back; they exist purely for operator inspection.
//!
//! Layout: `data/quarantine/<entity_kind>/<timestamp>_<fingerprint>.json`.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::validation::RowValidation;

#[derive(Debug, Serialize)]
struct QuarantineRecord<'a> {
    entity_kind: &'a str,
    payload: &'a Value,
    error_trace: String,
    quarantined_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct Quarantine {
    root: PathBuf,
}

impl Quarantine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes the rejected raw payload plus its validation trace. Returns
    /// the path written to, so callers (and tests) can assert on it.
    pub async fn record(
        &self,
        entity_kind: &str,
        payload: &Value,
        validation: &RowValidation,
    ) -> anyhow::Result<PathBuf> {
        let dir = self.root.join(entity_kind);
        tokio::fs::create_dir_all(&dir).await?;

        let fingerprint = crate::cache::fingerprint(entity_kind, &payload.to_string());
        let timestamp = chrono::Utc::now();
        let filename = format!("{}_{}.json", timestamp.format("%Y%m%dT%H%M%S%.fZ"), fingerprint);
        let path = dir.join(filename);

        let record = QuarantineRecord {
            entity_kind,
            payload,
            error_trace: validation.summary(),
            quarantined_at: timestamp,
        };
        let body = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(&path, body).await?;
        warn!(entity_kind, path = %path.display(), trace = %validation.summary(), "row quarantined");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn quarantine_record_deserializes_back_to_rejected_payload() {
        let dir = tempfile::tempdir().unwrap();
        let quarantine = Quarantine::new(dir.path());
        let payload = json!({"player_id": -1, "name": "Nobody"});
        let mut validation = RowValidation::default();
        validation.push("player_id", "must be a positive integer");

        let path = quarantine.record("players", &payload, &validation).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Value = serde_json::from_str(&written).unwrap();

        assert_eq!(parsed["payload"], payload);
        assert!(parsed["error_trace"].as_str().unwrap().contains("player_id"));
    }
}
