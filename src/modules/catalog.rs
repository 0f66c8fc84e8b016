//! Course catalog module.
//!
//! Scrapes a public catalog page listing course cards and derives one record
//! per course. Works against openHPI-style markup: `div.course-card` nodes
//! with `__title` and `__description` children.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::{ProcessedData, ScrapedData, Source};
use crate::registry::{AnalyzeOutcome, Analyzer, ScrapeOutcome, Scraper};
use crate::repository::Database;

pub const CATALOG_MODULE: &str = "course_catalog";

/// Topic terms and weights used for the relevance score. Higher-weight terms
/// mark courses the downstream dashboards care most about.
const TOPIC_TERMS: &[(&str, f64)] = &[
    ("programming", 1.0),
    ("python", 0.9),
    ("java", 0.9),
    ("data", 0.8),
    ("machine", 0.8),
    ("learning", 0.8),
    ("security", 0.8),
    ("cloud", 0.7),
    ("internet", 0.6),
    ("design", 0.5),
    ("business", 0.4),
    ("beginner", 0.3),
];

/// Fetches the catalog page and stores the raw HTML.
pub struct CatalogScraper {
    user_agent: String,
    timeout: Duration,
}

impl CatalogScraper {
    pub fn new(user_agent: String, timeout: Duration) -> Self {
        Self {
            user_agent,
            timeout,
        }
    }
}

#[async_trait]
impl Scraper for CatalogScraper {
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
        if !status.is_success() {
            return ScrapeOutcome::failed(format!("unexpected status {status} from {}", source.url));
        }

        let capture = ScrapedData::new(&source.id, &source.url, body.to_vec(), Some(status.as_u16()));
        if let Err(e) = db.scraped().insert(&capture) {
            return ScrapeOutcome::failed(format!("store capture: {e}"));
        }
        debug!(source = %source.id, bytes = capture.payload.len(), "catalog page captured");
        ScrapeOutcome::ok(1, capture.id)
    }
}

/// Parses course cards out of a stored catalog capture.
pub struct CatalogAnalyzer {
    whitespace: Regex,
}

impl CatalogAnalyzer {
    pub fn new() -> Self {
        Self {
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    fn clean(&self, text: &str) -> String {
        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }
}

impl Default for CatalogAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted term-frequency score in `[0, 1]`.
fn relevance_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    let mut max = 0.0;
    for (term, weight) in TOPIC_TERMS {
        max += weight;
        let count = words.iter().filter(|w| *w == term).count();
        if count > 0 {
            score += weight * (1.0 + (count as f64).ln().min(1.0));
        }
    }
    (score / max).min(1.0)
}

#[async_trait]
impl Analyzer for CatalogAnalyzer {
    async fn analyze(&self, db: &Database, scraped: &ScrapedData) -> AnalyzeOutcome {
        let html = Html::parse_document(&scraped.payload_text());
        let card = Selector::parse("div.course-card").unwrap();
        let title = Selector::parse(".course-card__title").unwrap();
        let description = Selector::parse(".course-card__description").unwrap();

        let processed = db.processed();
        let mut items = 0u64;
        for (position, node) in html.select(&card).enumerate() {
            let card_title = node
                .select(&title)
                .next()
                .map(|t| self.clean(&t.text().collect::<String>()))
                .unwrap_or_default();
            if card_title.is_empty() {
                continue;
            }
            let card_description = node
                .select(&description)
                .next()
                .map(|d| self.clean(&d.text().collect::<String>()))
                .unwrap_or_default();

            let score = relevance_score(&format!("{card_title} {card_description}"));
            let record = ProcessedData::new(
                &scraped.id,
                CATALOG_MODULE,
                card_title,
                card_description,
            )
            .with_score(score)
            .with_metadata(serde_json::json!({
                "position": position,
                "source_url": scraped.url,
            }));

            if let Err(e) = processed.insert(&record) {
                return AnalyzeOutcome::failed(format!("store record: {e}"));
            }
            items += 1;
        }

        if items == 0 {
            debug!(scraped = %scraped.id, "no course cards in capture");
        }
        AnalyzeOutcome::ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_scores_topic_matches_higher() {
        let ml = relevance_score("Practical Machine Learning with Python");
        let knitting = relevance_score("Introduction to Alpine Knitting");
        assert!(ml > knitting);
        assert!(ml <= 1.0);
        assert_eq!(relevance_score(""), 0.0);
    }

    #[tokio::test]
    async fn analyzer_extracts_one_record_per_card() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        db.sources()
            .save(&Source::new(
                "cat".into(),
                "Catalog".into(),
                "https://courses.example.org".into(),
                CATALOG_MODULE.into(),
            ))
            .unwrap();

        let html = r#"
            <html><body>
              <div class="course-card">
                <div class="course-card__title">  Cloud  Security
                </div>
                <div class="course-card__description">Hands-on security in the cloud.</div>
              </div>
              <div class="course-card">
                <div class="course-card__title">Spreadsheet Basics</div>
              </div>
              <div class="course-card"><div class="course-card__description">no title</div></div>
            </body></html>
        "#;
        let capture = ScrapedData::new("cat", "https://courses.example.org", html.into(), Some(200));
        db.scraped().insert(&capture).unwrap();

        let outcome = CatalogAnalyzer::new().analyze(&db, &capture).await;
        assert!(outcome.success);
        assert_eq!(outcome.items_produced, 2);

        let records = db.processed().for_scraped(&capture.id).unwrap();
        assert_eq!(records.len(), 2);
        let cloud = records.iter().find(|r| r.title == "Cloud Security").unwrap();
        let basics = records.iter().find(|r| r.title == "Spreadsheet Basics").unwrap();
        assert_eq!(cloud.body, "Hands-on security in the cloud.");
        assert!(cloud.score.unwrap() > basics.score.unwrap());
    }
}
