//! The stats JSON API: a cached, rate-limited client for the league's
//! modern (1996-forward) structured endpoints -- box scores, play-by-play,
//! rosters, standings. A GET through a shared `reqwest::Client`, a cache
//! layer in front of it, and caller-driven retry rather than retry baked
//! into the client itself (retry lives one layer up, in
//! `ingestor::Ingestor::ingest`, so it can also cover cache misses that
//! fail after a rate-limit wait).

use serde_json::Value;

use crate::cache::fingerprint;
use crate::errors::IngestError;
use crate::ingestor::FetchContext;

pub struct StatsApiClient {
    base_url: String,
}

impl StatsApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Fetches `endpoint` with `params`, consulting the cache first. Params
    /// are canonicalized (sorted by key) before fingerprinting so
    /// equivalent requests share a cache entry regardless of call-site
    /// ordering.
    pub async fn get_json(
        &self,
        ctx: &FetchContext,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, IngestError> {
        let canonical = canonicalize(params);
        let key = fingerprint(endpoint, &canonical);

        if let Some(cache) = &ctx.cache {
            if let Some(bytes) = cache.get("stats_api", &key).await {
                return Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                    IngestError::ValidationFailedPayload(format!("corrupt cache entry: {e}"))
                })?));
            }
        }

        let url = format!("{}/{endpoint}", self.base_url);
        let response = rate_limited_get_with_query(ctx, &url, params).await?;
        if !response.status().is_success() {
            return Err(crate::ingestor::classify_status(response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| crate::ingestor::classify_reqwest_error(&e))?;

        if let Some(cache) = &ctx.cache {
            let _ = cache.put("stats_api", &key, &bytes).await;
        }

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| IngestError::ValidationFailedPayload(format!("not json: {e}")))?;
        Ok(Some(value))
    }
}

async fn rate_limited_get_with_query(
    ctx: &FetchContext,
    url: &str,
    params: &[(&str, &str)],
) -> Result<reqwest::Response, IngestError> {
    ctx.rate_limiter.acquire().await;
    ctx.http
        .get(url)
        .query(params)
        .send()
        .await
        .map_err(|e| crate::ingestor::classify_reqwest_error(&e))
}

fn canonicalize(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_is_order_independent() {
        let a = canonicalize(&[("season", "2019-20"), ("team_id", "5")]);
        let b = canonicalize(&[("team_id", "5"), ("season", "2019-20")]);
        assert_eq!(a, b);
    }
}
