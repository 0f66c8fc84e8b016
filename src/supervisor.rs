//! Job supervisor: wraps a single scraper/analyzer invocation with lifecycle
//! bookkeeping and fault isolation.
//!
//! Every invocation is one job row moving `pending -> running -> completed |
//! failed`. The module function runs in its own task so that a panic, a
//! reported failure, or a cancellation all land in the same place: a terminal
//! failed job with a bounded error message. A job is never left `running`.
//!
//! There is no retry state. A failed job is terminal; retrying is a new job
//! issued by the caller.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{Job, JobType, ModelError, ScrapedData, Source};
use crate::registry::{Analyzer, RegistryError, Scraper};
use crate::repository::{Database, DbError};

/// Error message recorded when a run is cancelled, distinguishable from
/// module-reported failures.
pub const CANCELLED_ERROR: &str = "cancelled";

/// Upper bound on stored error messages.
const MAX_ERROR_LEN: usize = 1024;

/// Options for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run even if the source is inactive. The run is recorded normally and
    /// a warning is logged.
    pub force: bool,
}

/// Normalized result of one run, success or failure, returned to callers.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Whether the module reported success.
    pub success: bool,
    /// The job that tracked this run.
    pub job_id: String,
    /// Items produced (module-defined unit; may be partial on failure).
    pub items_produced: u64,
    /// Capture created by a scrape run, if any.
    pub scraped_data_id: Option<String>,
    /// Bounded failure description when `success` is false.
    pub error: Option<String>,
}

/// Configuration errors: caller mistakes or stale references, surfaced
/// before any job row is created.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("source is inactive: {0}")]
    SourceInactive(String),
    #[error("scraped data not found: {0}")]
    ScrapedDataNotFound(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Cooperative cancellation signal accepted by the supervisor.
///
/// On cancellation the in-flight module task is aborted and the job is
/// failed with [`CANCELLED_ERROR`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn disabled() -> Self {
        Self { rx: None }
    }

    /// Resolves when cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = &mut self.rx {
            if *rx.borrow() {
                return;
            }
            while rx.changed().await.is_ok() {
                if *rx.borrow() {
                    return;
                }
            }
        }
        // No sender, or the sender went away without cancelling.
        std::future::pending::<()>().await;
    }
}

/// Hands out [`CancelToken`]s and flips them.
#[derive(Debug)]
pub struct CancelSwitch {
    tx: watch::Sender<bool>,
}

impl CancelSwitch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancelSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate an error message to the stored bound, on a char boundary.
fn bounded_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

/// Extract a printable message from a panicked task.
fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            }
        }
        Err(_) => "task cancelled".to_string(),
    }
}

/// Await a spawned module task under a cancellation signal.
///
/// `Err` carries a fault description: panic, abort, or cancellation.
async fn supervise<T>(mut task: JoinHandle<T>, mut cancel: CancelToken) -> Result<T, String> {
    tokio::select! {
        res = &mut task => match res {
            Ok(value) => Ok(value),
            Err(err) if err.is_panic() => {
                Err(format!("module panicked: {}", panic_message(err)))
            }
            Err(_) => Err("module task aborted".to_string()),
        },
        _ = cancel.cancelled() => {
            task.abort();
            Err(CANCELLED_ERROR.to_string())
        }
    }
}

/// Supervises single invocations of registered module functions.
///
/// Holds no state beyond the data store handle; per-invocation state is one
/// job row. No lock spans the module call, so invocations for different (or
/// the same) source may run concurrently. Serializing runs per source is
/// deliberately the caller's concern.
pub struct JobSupervisor {
    db: Database,
}

impl JobSupervisor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Execute one scrape invocation against a loaded source.
    pub async fn execute_scrape(
        &self,
        scraper: Arc<dyn Scraper>,
        source: &Source,
        options: RunOptions,
        cancel: CancelToken,
    ) -> Result<RunOutcome, RunError> {
        // Fail fast before creating a job, so invalid invocations do not
        // pollute history. A forced run on an inactive source is recorded.
        if !source.active {
            if options.force {
                warn!(source = %source.id, "forced scrape of inactive source");
            } else {
                return Err(RunError::SourceInactive(source.id.clone()));
            }
        }

        let jobs = self.db.jobs();
        let mut job = Job::new(JobType::Scrape, &source.id, &source.module);
        jobs.insert(&job)?;
        job.start()?;
        jobs.update(&job)?;
        info!(job = %job.id, source = %source.id, module = %source.module, "scrape job started");

        let task = {
            let db = self.db.clone();
            let source = source.clone();
            tokio::spawn(async move { scraper.scrape(&db, &source).await })
        };

        match supervise(task, cancel).await {
            Ok(outcome) if outcome.success => {
                job.complete(outcome.items_produced)?;
                jobs.update(&job)?;
                self.db.sources().update_last_scraped(&source.id, Utc::now())?;
                info!(job = %job.id, items = outcome.items_produced, "scrape job completed");
                Ok(RunOutcome {
                    success: true,
                    job_id: job.id,
                    items_produced: outcome.items_produced,
                    scraped_data_id: outcome.scraped_data_id,
                    error: None,
                })
            }
            Ok(outcome) => {
                let message = bounded_error(
                    outcome.error.as_deref().unwrap_or("scraper reported failure"),
                );
                job.fail(message.clone(), outcome.items_produced)?;
                jobs.update(&job)?;
                warn!(job = %job.id, error = %message, "scrape job failed");
                Ok(RunOutcome {
                    success: false,
                    job_id: job.id,
                    items_produced: outcome.items_produced,
                    scraped_data_id: outcome.scraped_data_id,
                    error: Some(message),
                })
            }
            Err(fault) => {
                let message = bounded_error(&fault);
                job.fail(message.clone(), 0)?;
                jobs.update(&job)?;
                warn!(job = %job.id, error = %message, "scrape job faulted");
                Ok(RunOutcome {
                    success: false,
                    job_id: job.id,
                    items_produced: 0,
                    scraped_data_id: None,
                    error: Some(message),
                })
            }
        }
    }

    /// Execute one analysis invocation against a loaded capture.
    ///
    /// Source activity is not checked here: analysis of already-captured
    /// data is allowed for inactive sources.
    pub async fn execute_analyze(
        &self,
        analyzer: Arc<dyn Analyzer>,
        source: &Source,
        scraped: &ScrapedData,
        cancel: CancelToken,
    ) -> Result<RunOutcome, RunError> {
        let jobs = self.db.jobs();
        let mut job = Job::new(JobType::Analyze, &source.id, &source.module);
        jobs.insert(&job)?;
        job.start()?;
        jobs.update(&job)?;
        info!(job = %job.id, scraped = %scraped.id, module = %source.module, "analyze job started");

        let task = {
            let db = self.db.clone();
            let scraped = scraped.clone();
            tokio::spawn(async move { analyzer.analyze(&db, &scraped).await })
        };

        match supervise(task, cancel).await {
            Ok(outcome) if outcome.success => {
                job.complete(outcome.items_produced)?;
                jobs.update(&job)?;
                info!(job = %job.id, items = outcome.items_produced, "analyze job completed");
                Ok(RunOutcome {
                    success: true,
                    job_id: job.id,
                    items_produced: outcome.items_produced,
                    scraped_data_id: None,
                    error: None,
                })
            }
            Ok(outcome) => {
                let message = bounded_error(
                    outcome.error.as_deref().unwrap_or("analyzer reported failure"),
                );
                job.fail(message.clone(), outcome.items_produced)?;
                jobs.update(&job)?;
                warn!(job = %job.id, error = %message, "analyze job failed");
                Ok(RunOutcome {
                    success: false,
                    job_id: job.id,
                    items_produced: outcome.items_produced,
                    scraped_data_id: None,
                    error: Some(message),
                })
            }
            Err(fault) => {
                let message = bounded_error(&fault);
                job.fail(message.clone(), 0)?;
                jobs.update(&job)?;
                warn!(job = %job.id, error = %message, "analyze job faulted");
                Ok(RunOutcome {
                    success: false,
                    job_id: job.id,
                    items_produced: 0,
                    scraped_data_id: None,
                    error: Some(message),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_error_truncates_on_char_boundary() {
        let long = "ü".repeat(2000);
        let bounded = bounded_error(&long);
        assert!(bounded.len() <= MAX_ERROR_LEN);
        assert!(long.starts_with(&bounded));

        assert_eq!(bounded_error("short"), "short");
    }

    #[tokio::test]
    async fn disabled_token_never_fires() {
        let mut token = CancelToken::disabled();
        let fired = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            token.cancelled(),
        )
        .await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn switch_fires_all_tokens() {
        let switch = CancelSwitch::new();
        let mut token = switch.token();
        switch.cancel();
        // Resolves immediately once flipped.
        token.cancelled().await;
    }
}
