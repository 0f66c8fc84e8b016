//! Built-in scraper/analyzer modules.
//!
//! Each module is a named scraper plus optional analyzer registered under a
//! stable contract; the orchestration core knows nothing about what any of
//! them do. Registration happens once at startup via [`register_builtin`].

mod archive;
mod catalog;
mod reports;

pub use archive::{ArchiveScraper, ARCHIVE_MODULE};
pub use catalog::{CatalogAnalyzer, CatalogScraper, CATALOG_MODULE};
pub use reports::{ReportsAnalyzer, ReportsScraper, REPORTS_MODULE};

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::registry::{ModuleRegistry, RegistryError};

/// Register every built-in module. Called once at process start.
pub fn register_builtin(
    registry: &ModuleRegistry,
    settings: &Settings,
) -> Result<(), RegistryError> {
    let user_agent = settings.user_agent.clone();
    let timeout = settings.request_timeout();

    registry.register(
        CATALOG_MODULE,
        Arc::new(CatalogScraper::new(user_agent.clone(), timeout)),
        Some(Arc::new(CatalogAnalyzer::new())),
    )?;
    registry.register(
        REPORTS_MODULE,
        Arc::new(ReportsScraper::new(user_agent.clone(), timeout)),
        Some(Arc::new(ReportsAnalyzer)),
    )?;
    // Archive is capture-only: no analyzer, analysis requests are a benign skip.
    registry.register(
        ARCHIVE_MODULE,
        Arc::new(ArchiveScraper::new(user_agent, timeout)),
        None,
    )?;
    Ok(())
}

/// Build the HTTP client shared by the built-in scrapers.
///
/// Returns the failure as a string because scrapers report problems through
/// their outcome record instead of raising.
pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| format!("http client: {e}"))
}
