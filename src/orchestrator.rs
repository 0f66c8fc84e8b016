//! Caller-facing entry points gluing registry resolution to supervised
//! execution.
//!
//! Orchestrators load the target, resolve the module through the registry,
//! and delegate to the [`JobSupervisor`]. They normalize supervisor results
//! but never swallow them: configuration mistakes come back as [`RunError`]
//! (no job created), execution failures as a [`RunOutcome`] with
//! `success: false` and a job to inspect.

use std::sync::Arc;

use crate::models::Job;
use crate::registry::ModuleRegistry;
use crate::repository::Database;
use crate::supervisor::{CancelToken, JobSupervisor, RunError, RunOptions, RunOutcome};

/// Entry point for scrape runs.
pub struct ScrapeOrchestrator {
    supervisor: JobSupervisor,
    registry: Arc<ModuleRegistry>,
}

impl ScrapeOrchestrator {
    pub fn new(db: Database, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            supervisor: JobSupervisor::new(db),
            registry,
        }
    }

    /// Run one scrape against a source by id.
    pub async fn run(&self, source_id: &str) -> Result<RunOutcome, RunError> {
        self.run_with(source_id, RunOptions::default(), CancelToken::disabled())
            .await
    }

    /// Run one scrape with explicit options and cancellation.
    pub async fn run_with(
        &self,
        source_id: &str,
        options: RunOptions,
        cancel: CancelToken,
    ) -> Result<RunOutcome, RunError> {
        let db = self.supervisor.database();
        let source = db
            .sources()
            .get(source_id)?
            .ok_or_else(|| RunError::SourceNotFound(source_id.to_string()))?;
        let scraper = self.registry.scraper(&source.module)?;
        self.supervisor
            .execute_scrape(scraper, &source, options, cancel)
            .await
    }

    /// Look up a job for status polling.
    pub fn job(&self, job_id: &str) -> Result<Option<Job>, RunError> {
        Ok(self.supervisor.database().jobs().get(job_id)?)
    }
}

/// Entry point for analysis runs.
pub struct AnalysisOrchestrator {
    supervisor: JobSupervisor,
    registry: Arc<ModuleRegistry>,
}

impl AnalysisOrchestrator {
    pub fn new(db: Database, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            supervisor: JobSupervisor::new(db),
            registry,
        }
    }

    /// Run one analysis against a capture by id.
    ///
    /// The owning source supplies the module name. A module without an
    /// analyzer fails with `RegistryError::NoAnalyzer` before any job is
    /// created; callers treat that as a benign no-op, distinct from an
    /// unknown module.
    pub async fn run(&self, scraped_data_id: &str) -> Result<RunOutcome, RunError> {
        self.run_with(scraped_data_id, CancelToken::disabled()).await
    }

    /// Run one analysis with explicit cancellation.
    pub async fn run_with(
        &self,
        scraped_data_id: &str,
        cancel: CancelToken,
    ) -> Result<RunOutcome, RunError> {
        let db = self.supervisor.database();
        let scraped = db
            .scraped()
            .get(scraped_data_id)?
            .ok_or_else(|| RunError::ScrapedDataNotFound(scraped_data_id.to_string()))?;
        let source = db
            .sources()
            .get(&scraped.source_id)?
            .ok_or_else(|| RunError::SourceNotFound(scraped.source_id.clone()))?;
        let analyzer = self.registry.analyzer(&source.module)?;
        self.supervisor
            .execute_analyze(analyzer, &source, &scraped, cancel)
            .await
    }

    /// Look up a job for status polling.
    pub fn job(&self, job_id: &str) -> Result<Option<Job>, RunError> {
        Ok(self.supervisor.database().jobs().get(job_id)?)
    }
}
