//! Course reports module.
//!
//! Scrapes a JSON report endpoint (the kind backing admin course summary
//! exports) and flattens each course report into one derived record carrying
//! its engagement KPIs. Endpoints that require authentication take a bearer
//! token from the source config under `api_token`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::models::{ProcessedData, ScrapedData, Source};
use crate::registry::{AnalyzeOutcome, Analyzer, ScrapeOutcome, Scraper};
use crate::repository::Database;

pub const REPORTS_MODULE: &str = "course_reports";

/// Fetches the report endpoint and stores the raw JSON.
pub struct ReportsScraper {
    user_agent: String,
    timeout: Duration,
}

impl ReportsScraper {
    pub fn new(user_agent: String, timeout: Duration) -> Self {
        Self {
            user_agent,
            timeout,
        }
    }
}

#[async_trait]
impl Scraper for ReportsScraper {
    async fn scrape(&self, db: &Database, source: &Source) -> ScrapeOutcome {
        let client = match super::build_client(&self.user_agent, self.timeout) {
            Ok(client) => client,
            Err(e) => return ScrapeOutcome::failed(e),
        };

        let mut request = client.get(&source.url).header("Accept", "application/json");
        if let Some(token) = source.config_str("api_token") {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return ScrapeOutcome::failed(format!("request failed: {e}")),
        };
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return ScrapeOutcome::failed(format!("read body failed: {e}")),
        };
        if !status.is_success() {
            return ScrapeOutcome::failed(format!("unexpected status {status} from {}", source.url));
        }

        let capture = ScrapedData::new(&source.id, &source.url, body.to_vec(), Some(status.as_u16()));
        if let Err(e) = db.scraped().insert(&capture) {
            return ScrapeOutcome::failed(format!("store capture: {e}"));
        }
        debug!(source = %source.id, bytes = capture.payload.len(), "report endpoint captured");
        ScrapeOutcome::ok(1, capture.id)
    }
}

/// Flattens course report rows out of a stored JSON capture.
pub struct ReportsAnalyzer;

/// Accept either a bare array or an object wrapping it under `courses`.
fn report_rows(root: &Value) -> Option<&Vec<Value>> {
    match root {
        Value::Array(rows) => Some(rows),
        Value::Object(map) => map.get("courses").and_then(|v| v.as_array()),
        _ => None,
    }
}

#[async_trait]
impl Analyzer for ReportsAnalyzer {
    async fn analyze(&self, db: &Database, scraped: &ScrapedData) -> AnalyzeOutcome {
        let root: Value = match serde_json::from_slice(&scraped.payload) {
            Ok(root) => root,
            Err(e) => return AnalyzeOutcome::failed(format!("invalid report JSON: {e}")),
        };
        let rows = match report_rows(&root) {
            Some(rows) => rows,
            None => return AnalyzeOutcome::failed("report JSON has no course rows"),
        };

        let processed = db.processed();
        let mut items = 0u64;
        for row in rows {
            let Some(course) = row.as_object() else {
                continue;
            };
            let code = course.get("code").and_then(|v| v.as_str()).unwrap_or("");
            let name = course.get("name").and_then(|v| v.as_str()).unwrap_or(code);
            if name.is_empty() {
                continue;
            }
            let status = course.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
            let start = course.get("start_date").and_then(|v| v.as_str()).unwrap_or("?");
            let end = course.get("end_date").and_then(|v| v.as_str()).unwrap_or("?");

            // Every numeric column is a KPI worth keeping.
            let mut kpis = serde_json::Map::new();
            for (key, value) in course {
                if value.is_number() {
                    kpis.insert(key.clone(), value.clone());
                }
            }
            kpis.insert("status".into(), Value::String(status.to_string()));
            kpis.insert("code".into(), Value::String(code.to_string()));

            let score = course
                .get("enrollments")
                .and_then(|v| v.as_f64());

            let mut record = ProcessedData::new(
                &scraped.id,
                REPORTS_MODULE,
                name.to_string(),
                format!("{status} course {code} ({start} to {end})"),
            )
            .with_metadata(Value::Object(kpis));
            if let Some(score) = score {
                record = record.with_score(score);
            }

            if let Err(e) = processed.insert(&record) {
                return AnalyzeOutcome::failed(format!("store record: {e}"));
            }
            items += 1;
        }

        AnalyzeOutcome::ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn analyzer_flattens_course_rows_with_kpis() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        db.sources()
            .save(&Source::new(
                "rep".into(),
                "Reports".into(),
                "https://api.example.org/reports".into(),
                REPORTS_MODULE.into(),
            ))
            .unwrap();

        let json = serde_json::json!({
            "courses": [
                {
                    "code": "cloud2026",
                    "name": "Cloud Operations",
                    "status": "active",
                    "start_date": "2026-04-01",
                    "end_date": "2026-06-01",
                    "enrollments": 1520,
                    "topics": 44,
                    "collab_space_posts": 210,
                    "helpdesk_tickets": 12,
                    "issued_badges": 390
                },
                { "code": "", "name": "", "status": "draft" },
                "not-an-object"
            ]
        });
        let capture = ScrapedData::new(
            "rep",
            "https://api.example.org/reports",
            serde_json::to_vec(&json).unwrap(),
            Some(200),
        );
        db.scraped().insert(&capture).unwrap();

        let outcome = ReportsAnalyzer.analyze(&db, &capture).await;
        assert!(outcome.success);
        assert_eq!(outcome.items_produced, 1);

        let records = db.processed().for_scraped(&capture.id).unwrap();
        assert_eq!(records[0].title, "Cloud Operations");
        assert_eq!(records[0].score, Some(1520.0));
        assert_eq!(records[0].metadata["topics"], 44);
        assert_eq!(records[0].metadata["status"], "active");
    }

    #[tokio::test]
    async fn analyzer_rejects_malformed_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        db.sources()
            .save(&Source::new(
                "rep".into(),
                "Reports".into(),
                "https://api.example.org/reports".into(),
                REPORTS_MODULE.into(),
            ))
            .unwrap();

        let capture = ScrapedData::new("rep", "https://api", b"<html>not json</html>".to_vec(), Some(200));
        db.scraped().insert(&capture).unwrap();

        let outcome = ReportsAnalyzer.analyze(&db, &capture).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("invalid report JSON"));
        assert_eq!(db.processed().count_for_scraped(&capture.id).unwrap(), 0);
    }
}
