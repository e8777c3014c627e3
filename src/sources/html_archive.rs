//! HTML archive client: fetches historical pages that never change once
//! published (old box scores, draft-day recaps). Cached indefinitely --
//! unlike `stats_api`, there's no freshness concern since the page is a
//! record of a completed event.

use crate::cache::fingerprint;
use crate::errors::IngestError;
use crate::ingestor::{rate_limited_get, FetchContext};

pub struct HtmlArchiveClient;

impl HtmlArchiveClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_page(&self, ctx: &FetchContext, url: &str) -> Result<Option<String>, IngestError> {
        let key = fingerprint("html_archive", url);

        if let Some(cache) = &ctx.cache {
            if let Some(bytes) = cache.get("html_archive", &key).await {
                return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
            }
        }

        let response = rate_limited_get(ctx, url).await?;
        if !response.status().is_success() {
            return Err(crate::ingestor::classify_status(response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| crate::ingestor::classify_reqwest_error(&e))?;

        if let Some(cache) = &ctx.cache {
            let _ = cache.put("html_archive", &key, body.as_bytes()).await;
        }

        Ok(Some(body))
    }
}

impl Default for HtmlArchiveClient {
    fn default() -> Self {
        Self::new()
    }
}
