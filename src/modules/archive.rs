//! Page archive module.
//!
//! Capture-only: stores whatever the origin returns, byte for byte, so a
//! page can be audited later. Registers no analyzer.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::models::{ScrapedData, Source};
use crate::registry::{ScrapeOutcome, Scraper};
use crate::repository::Database;

pub const ARCHIVE_MODULE: &str = "page_archive";

/// Fetches a page and stores the raw response.
pub struct ArchiveScraper {
    user_agent: String,
    timeout: Duration,
}

impl ArchiveScraper {
    pub fn new(user_agent: String, timeout: Duration) -> Self {
        Self {
            user_agent,
            timeout,
        }
    }
}

#[async_trait]
impl Scraper for ArchiveScraper {
    async fn scrape(&self, db: &Database, source: &Source) -> ScrapeOutcome {
        let client = match super::build_client(&self.user_agent, self.timeout) {
            Ok(client) => client,
            Err(e) => return ScrapeOutcome::failed(e),
        };

        let response = match client.get(&source.url).send().await {
            Ok(response) => response,
            Err(e) => return ScrapeOutcome::failed(format!("request failed: {e}")),
        };
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return ScrapeOutcome::failed(format!("read body failed: {e}")),
        };
        // Archive captures keep error pages too; only transport failures fail
        // the run.
        let capture = ScrapedData::new(&source.id, &source.url, body.to_vec(), Some(status.as_u16()));
        if let Err(e) = db.scraped().insert(&capture) {
            return ScrapeOutcome::failed(format!("store capture: {e}"));
        }
        debug!(source = %source.id, status = %status, bytes = capture.payload.len(), "page archived");
        ScrapeOutcome::ok(1, capture.id)
    }
}
