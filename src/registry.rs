//! Module registry: maps a module name to its scraper/analyzer capability pair.
//!
//! Modules register once at process start through an explicit call; after
//! that the registry is read-only and safe for concurrent lookup. Hot
//! reloading a module is out of scope.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ScrapedData, Source};
use crate::repository::Database;

/// Result record every scraper returns.
///
/// Expected source-side failures (HTTP errors, missing fields) come back as
/// a failed outcome, not an `Err` and not a panic. The supervisor treats a
/// panic as a defect and records it on the job.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// Whether the scrape succeeded.
    pub success: bool,
    /// Items the scraper produced (module-defined unit).
    pub items_produced: u64,
    /// Capture created by this run, if any.
    pub scraped_data_id: Option<String>,
    /// Failure description when `success` is false.
    pub error: Option<String>,
}

impl ScrapeOutcome {
    /// Successful scrape that produced a capture.
    pub fn ok(items_produced: u64, scraped_data_id: String) -> Self {
        Self {
            success: true,
            items_produced,
            scraped_data_id: Some(scraped_data_id),
            error: None,
        }
    }

    /// Failed scrape.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            items_produced: 0,
            scraped_data_id: None,
            error: Some(error.into()),
        }
    }
}

/// Result record every analyzer returns.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    /// Whether the analysis succeeded.
    pub success: bool,
    /// Derived records created.
    pub items_produced: u64,
    /// Failure description when `success` is false.
    pub error: Option<String>,
}

impl AnalyzeOutcome {
    /// Successful analysis.
    pub fn ok(items_produced: u64) -> Self {
        Self {
            success: true,
            items_produced,
            error: None,
        }
    }

    /// Failed analysis.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            items_produced: 0,
            error: Some(error.into()),
        }
    }
}

/// Source-specific collection logic.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Collect from the source and persist captures through `db`.
    async fn scrape(&self, db: &Database, source: &Source) -> ScrapeOutcome;
}

/// Source-specific derivation logic.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Derive structured records from one capture, persisting through `db`.
    async fn analyze(&self, db: &Database, scraped: &ScrapedData) -> AnalyzeOutcome;
}

/// Registry lookup and registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration under a name that is already taken. Registration is not
    /// idempotent so one module can never silently shadow another.
    #[error("module already registered: {0}")]
    DuplicateModule(String),
    /// No module registered under this name.
    #[error("unknown module: {0}")]
    UnknownModule(String),
    /// Module exists but registered no analyzer. Callers treat this as a
    /// benign skip, unlike `UnknownModule`.
    #[error("module has no analyzer: {0}")]
    NoAnalyzer(String),
}

struct ModuleEntry {
    scraper: Arc<dyn Scraper>,
    analyzer: Option<Arc<dyn Analyzer>>,
}

/// Process-wide lookup from module name to capability pair.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, ModuleEntry>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under a unique name.
    pub fn register(
        &self,
        name: &str,
        scraper: Arc<dyn Scraper>,
        analyzer: Option<Arc<dyn Analyzer>>,
    ) -> Result<(), RegistryError> {
        let mut modules = self.modules.write().expect("registry lock poisoned");
        if modules.contains_key(name) {
            return Err(RegistryError::DuplicateModule(name.to_string()));
        }
        modules.insert(name.to_string(), ModuleEntry { scraper, analyzer });
        Ok(())
    }

    /// Resolve the scraper for a module.
    pub fn scraper(&self, name: &str) -> Result<Arc<dyn Scraper>, RegistryError> {
        let modules = self.modules.read().expect("registry lock poisoned");
        modules
            .get(name)
            .map(|entry| entry.scraper.clone())
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))
    }

    /// Resolve the analyzer for a module. `NoAnalyzer` is distinct from
    /// `UnknownModule` so callers can branch skip-vs-abort.
    pub fn analyzer(&self, name: &str) -> Result<Arc<dyn Analyzer>, RegistryError> {
        let modules = self.modules.read().expect("registry lock poisoned");
        let entry = modules
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?;
        entry
            .analyzer
            .clone()
            .ok_or_else(|| RegistryError::NoAnalyzer(name.to_string()))
    }

    /// Whether a module is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.modules
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Whether a module registered an analyzer.
    pub fn has_analyzer(&self, name: &str) -> bool {
        self.modules
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .is_some_and(|entry| entry.analyzer.is_some())
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullScraper;

    #[async_trait]
    impl Scraper for NullScraper {
        async fn scrape(&self, _db: &Database, _source: &Source) -> ScrapeOutcome {
            ScrapeOutcome::failed("null")
        }
    }

    struct NullAnalyzer;

    #[async_trait]
    impl Analyzer for NullAnalyzer {
        async fn analyze(&self, _db: &Database, _scraped: &ScrapedData) -> AnalyzeOutcome {
            AnalyzeOutcome::ok(0)
        }
    }

    #[test]
    fn resolves_the_exact_registered_scraper() {
        let registry = ModuleRegistry::new();
        let scraper: Arc<dyn Scraper> = Arc::new(NullScraper);
        registry
            .register("news", scraper.clone(), None)
            .unwrap();

        let resolved = registry.scraper("news").unwrap();
        assert!(Arc::ptr_eq(&resolved, &scraper));
    }

    #[test]
    fn duplicate_registration_is_rejected_and_original_kept() {
        let registry = ModuleRegistry::new();
        let first: Arc<dyn Scraper> = Arc::new(NullScraper);
        registry.register("news", first.clone(), None).unwrap();

        let second: Arc<dyn Scraper> = Arc::new(NullScraper);
        let err = registry
            .register("news", second, Some(Arc::new(NullAnalyzer)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateModule(_)));

        // The original registration is intact: same scraper, still no analyzer.
        assert!(Arc::ptr_eq(&registry.scraper("news").unwrap(), &first));
        assert!(matches!(
            registry.analyzer("news"),
            Err(RegistryError::NoAnalyzer(_))
        ));
    }

    #[test]
    fn unknown_and_missing_analyzer_are_distinct() {
        let registry = ModuleRegistry::new();
        registry
            .register("with", Arc::new(NullScraper), Some(Arc::new(NullAnalyzer)))
            .unwrap();
        registry
            .register("without", Arc::new(NullScraper), None)
            .unwrap();

        assert!(registry.analyzer("with").is_ok());
        assert!(matches!(
            registry.analyzer("without"),
            Err(RegistryError::NoAnalyzer(_))
        ));
        assert!(matches!(
            registry.analyzer("nowhere"),
            Err(RegistryError::UnknownModule(_))
        ));
        assert!(matches!(
            registry.scraper("nowhere"),
            Err(RegistryError::UnknownModule(_))
        ));
    }
}
