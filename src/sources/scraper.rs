//! Current-season HTML scraper: pages that change out from under us
//! (injury reports, live rosters), so unlike `html_archive` this never
//! consults or populates the cache -- every call is a live fetch. Still
//! rate-limited through the same `FetchContext`.
//!
//! HTML-parsing minutiae are deliberately thin here; each ingestor that
//! uses this owns its own scraping/extraction logic downstream of
//! `get_page`.

use crate::errors::IngestError;
use crate::ingestor::{rate_limited_get, FetchContext};

pub struct ScraperClient;

impl ScraperClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_page(&self, ctx: &FetchContext, url: &str) -> Result<String, IngestError> {
        let response = rate_limited_get(ctx, url).await?;
        if !response.status().is_success() {
            return Err(crate::ingestor::classify_status(response.status()));
        }
        response
            .text()
            .await
            .map_err(|e| crate::ingestor::classify_reqwest_error(&e))
    }
}

impl Default for ScraperClient {
    fn default() -> Self {
        Self::new()
    }
}
