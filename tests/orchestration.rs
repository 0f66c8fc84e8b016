//! End-to-end orchestration tests: registry resolution, job lifecycle,
//! fault isolation, and concurrency behavior against a real SQLite store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use courseharvest::models::{JobStatus, JobType, ScrapedData, Source};
use courseharvest::orchestrator::{AnalysisOrchestrator, ScrapeOrchestrator};
use courseharvest::registry::{
    AnalyzeOutcome, Analyzer, ModuleRegistry, RegistryError, ScrapeOutcome, Scraper,
};
use courseharvest::repository::Database;
use courseharvest::supervisor::{CancelSwitch, CancelToken, RunError, RunOptions, CANCELLED_ERROR};

struct Harness {
    _dir: tempfile::TempDir,
    db: Database,
    registry: Arc<ModuleRegistry>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("harvest.db")).unwrap();
    Harness {
        _dir: dir,
        db,
        registry: Arc::new(ModuleRegistry::new()),
    }
}

impl Harness {
    fn add_source(&self, id: &str, module: &str) -> Source {
        let source = Source::new(
            id.to_string(),
            format!("Source {id}"),
            format!("https://example.org/{id}"),
            module.to_string(),
        );
        self.db.sources().save(&source).unwrap();
        source
    }

    fn scraping(&self) -> ScrapeOrchestrator {
        ScrapeOrchestrator::new(self.db.clone(), self.registry.clone())
    }

    fn analysis(&self) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(self.db.clone(), self.registry.clone())
    }
}

/// Stores one capture and reports a fixed item count.
struct StoringScraper {
    items: u64,
}

#[async_trait]
impl Scraper for StoringScraper {
    async fn scrape(&self, db: &Database, source: &Source) -> ScrapeOutcome {
        let capture = ScrapedData::new(&source.id, &source.url, b"payload".to_vec(), Some(200));
        if let Err(e) = db.scraped().insert(&capture) {
            return ScrapeOutcome::failed(e.to_string());
        }
        ScrapeOutcome::ok(self.items, capture.id)
    }
}

/// Reports an expected failure without storing anything.
struct FailingScraper {
    message: String,
}

#[async_trait]
impl Scraper for FailingScraper {
    async fn scrape(&self, _db: &Database, _source: &Source) -> ScrapeOutcome {
        ScrapeOutcome::failed(self.message.clone())
    }
}

/// Defective module: panics mid-execution.
struct PanickingScraper;

#[async_trait]
impl Scraper for PanickingScraper {
    async fn scrape(&self, _db: &Database, _source: &Source) -> ScrapeOutcome {
        panic!("selector went missing")
    }
}

/// Blocks like a slow network call, then stores a capture.
struct SlowScraper {
    delay: Duration,
}

#[async_trait]
impl Scraper for SlowScraper {
    async fn scrape(&self, db: &Database, source: &Source) -> ScrapeOutcome {
        tokio::time::sleep(self.delay).await;
        let capture = ScrapedData::new(&source.id, &source.url, b"slow".to_vec(), Some(200));
        if let Err(e) = db.scraped().insert(&capture) {
            return ScrapeOutcome::failed(e.to_string());
        }
        ScrapeOutcome::ok(1, capture.id)
    }
}

/// Derives a fixed number of records from a capture.
struct CountingAnalyzer {
    records: u64,
}

#[async_trait]
impl Analyzer for CountingAnalyzer {
    async fn analyze(&self, db: &Database, scraped: &ScrapedData) -> AnalyzeOutcome {
        let processed = db.processed();
        for index in 0..self.records {
            let record = courseharvest::models::ProcessedData::new(
                &scraped.id,
                "news",
                format!("Item {index}"),
                "derived".to_string(),
            );
            if let Err(e) = processed.insert(&record) {
                return AnalyzeOutcome::failed(e.to_string());
            }
        }
        AnalyzeOutcome::ok(self.records)
    }
}

#[tokio::test]
async fn successful_scrape_records_completed_job() {
    let h = harness();
    h.registry
        .register("news", Arc::new(StoringScraper { items: 5 }), None)
        .unwrap();
    h.add_source("daily", "news");

    let orchestrator = h.scraping();
    let outcome = orchestrator.run("daily").await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_produced, 5);
    assert!(outcome.error.is_none());

    // The polling surface sees the same record as the repository.
    let polled = orchestrator.job(&outcome.job_id).unwrap().unwrap();
    assert_eq!(polled.id, outcome.job_id);

    let job = h.db.jobs().get(&outcome.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.job_type, JobType::Scrape);
    assert_eq!(job.module, "news");
    assert_eq!(job.items_produced, 5);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());

    // The capture landed and the source remembers the run.
    let capture_id = outcome.scraped_data_id.unwrap();
    assert!(h.db.scraped().get(&capture_id).unwrap().is_some());
    let source = h.db.sources().get("daily").unwrap().unwrap();
    assert!(source.last_scraped.is_some());
}

#[tokio::test]
async fn reported_failure_becomes_failed_job() {
    let h = harness();
    h.registry
        .register(
            "news",
            Arc::new(FailingScraper {
                message: "HTTP 503 from origin".into(),
            }),
            None,
        )
        .unwrap();
    h.add_source("daily", "news");

    let outcome = h.scraping().run("daily").await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("HTTP 503 from origin"));

    let job = h.db.jobs().get(&outcome.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.finished_at.is_some());
    assert_eq!(job.error.as_deref(), Some("HTTP 503 from origin"));

    // Nothing was stored and nothing retried.
    assert_eq!(h.db.scraped().count_for_source("daily").unwrap(), 0);
    assert_eq!(h.db.jobs().count().unwrap(), 1);
}

#[tokio::test]
async fn panicking_scraper_is_contained() {
    let h = harness();
    h.registry
        .register("news", Arc::new(PanickingScraper), None)
        .unwrap();
    h.add_source("daily", "news");

    let outcome = h.scraping().run("daily").await.unwrap();
    assert!(!outcome.success);
    let error = outcome.error.unwrap();
    assert!(error.contains("panicked"), "got: {error}");
    assert!(error.contains("selector went missing"), "got: {error}");

    let job = h.db.jobs().get(&outcome.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn unknown_source_fails_fast_without_job() {
    let h = harness();
    h.registry
        .register("news", Arc::new(StoringScraper { items: 1 }), None)
        .unwrap();

    let err = h.scraping().run("nowhere").await.unwrap_err();
    assert!(matches!(err, RunError::SourceNotFound(_)));
    assert_eq!(h.db.jobs().count().unwrap(), 0);
}

#[tokio::test]
async fn unknown_module_fails_fast_without_job() {
    let h = harness();
    h.add_source("daily", "unregistered");

    let err = h.scraping().run("daily").await.unwrap_err();
    assert!(matches!(
        err,
        RunError::Registry(RegistryError::UnknownModule(_))
    ));
    assert_eq!(h.db.jobs().count().unwrap(), 0);
}

#[tokio::test]
async fn inactive_source_is_skipped_unless_forced() {
    let h = harness();
    h.registry
        .register("news", Arc::new(StoringScraper { items: 1 }), None)
        .unwrap();
    h.add_source("daily", "news");
    h.db.sources().set_active("daily", false).unwrap();

    let err = h.scraping().run("daily").await.unwrap_err();
    assert!(matches!(err, RunError::SourceInactive(_)));
    assert_eq!(h.db.jobs().count().unwrap(), 0);

    // A forced run still works and is recorded normally.
    let outcome = h
        .scraping()
        .run_with("daily", RunOptions { force: true }, CancelToken::disabled())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(h.db.jobs().count().unwrap(), 1);
}

#[tokio::test]
async fn analysis_without_analyzer_is_benign_and_creates_no_job() {
    let h = harness();
    h.registry
        .register("news", Arc::new(StoringScraper { items: 1 }), None)
        .unwrap();
    h.add_source("daily", "news");

    let scrape = h.scraping().run("daily").await.unwrap();
    let capture_id = scrape.scraped_data_id.unwrap();

    let err = h.analysis().run(&capture_id).await.unwrap_err();
    assert!(matches!(
        err,
        RunError::Registry(RegistryError::NoAnalyzer(_))
    ));
    // Only the scrape job exists.
    assert_eq!(h.db.jobs().count().unwrap(), 1);
}

#[tokio::test]
async fn analysis_derives_records_under_a_completed_job() {
    let h = harness();
    h.registry
        .register(
            "news",
            Arc::new(StoringScraper { items: 1 }),
            Some(Arc::new(CountingAnalyzer { records: 3 })),
        )
        .unwrap();
    h.add_source("daily", "news");

    let scrape = h.scraping().run("daily").await.unwrap();
    let capture_id = scrape.scraped_data_id.unwrap();

    let outcome = h.analysis().run(&capture_id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_produced, 3);

    let job = h.db.jobs().get(&outcome.job_id).unwrap().unwrap();
    assert_eq!(job.job_type, JobType::Analyze);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(h.db.processed().count_for_scraped(&capture_id).unwrap(), 3);
}

#[tokio::test]
async fn analysis_of_missing_capture_fails_fast() {
    let h = harness();
    let err = h.analysis().run("nowhere").await.unwrap_err();
    assert!(matches!(err, RunError::ScrapedDataNotFound(_)));
    assert_eq!(h.db.jobs().count().unwrap(), 0);
}

#[tokio::test]
async fn repeated_scrapes_are_independent() {
    let h = harness();
    h.registry
        .register("news", Arc::new(StoringScraper { items: 1 }), None)
        .unwrap();
    h.add_source("daily", "news");

    let first = h.scraping().run("daily").await.unwrap();
    let second = h.scraping().run("daily").await.unwrap();
    assert!(first.success && second.success);
    assert_ne!(first.job_id, second.job_id);
    assert_ne!(first.scraped_data_id, second.scraped_data_id);

    assert_eq!(h.db.jobs().count().unwrap(), 2);
    assert_eq!(h.db.scraped().count_for_source("daily").unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scrapes_of_one_source_do_not_interfere() {
    let h = harness();
    h.registry
        .register(
            "news",
            Arc::new(SlowScraper {
                delay: Duration::from_millis(50),
            }),
            None,
        )
        .unwrap();
    h.add_source("daily", "news");

    let orchestrator = Arc::new(h.scraping());
    let a = {
        let o = orchestrator.clone();
        tokio::spawn(async move { o.run("daily").await })
    };
    let b = {
        let o = orchestrator.clone();
        tokio::spawn(async move { o.run("daily").await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert!(a.success && b.success);
    assert_ne!(a.job_id, b.job_id);
    assert_ne!(a.scraped_data_id, b.scraped_data_id);
    assert_eq!(h.db.jobs().count().unwrap(), 2);
    assert_eq!(h.db.scraped().count_for_source("daily").unwrap(), 2);
}

#[tokio::test]
async fn cancellation_fails_the_job_with_a_distinguishable_error() {
    let h = harness();
    h.registry
        .register(
            "news",
            Arc::new(SlowScraper {
                delay: Duration::from_secs(30),
            }),
            None,
        )
        .unwrap();
    h.add_source("daily", "news");

    let switch = CancelSwitch::new();
    let token = switch.token();
    let orchestrator = h.scraping();

    let (outcome, _) = tokio::join!(
        orchestrator.run_with("daily", RunOptions::default(), token),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            switch.cancel();
        }
    );

    let outcome = outcome.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some(CANCELLED_ERROR));

    // The job is terminal, never left running.
    let job = h.db.jobs().get(&outcome.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(CANCELLED_ERROR));
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn stored_error_messages_are_bounded() {
    let h = harness();
    h.registry
        .register(
            "news",
            Arc::new(FailingScraper {
                message: "x".repeat(5000),
            }),
            None,
        )
        .unwrap();
    h.add_source("daily", "news");

    let outcome = h.scraping().run("daily").await.unwrap();
    let job = h.db.jobs().get(&outcome.job_id).unwrap().unwrap();
    let error = job.error.unwrap();
    assert!(!error.is_empty());
    assert!(error.len() <= 1024);
}
