//! Derived record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One structured record derived from a raw capture by an analyzer.
///
/// A capture may fan out into many of these (one per extracted item), or
/// have none if its module registered no analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedData {
    /// Unique identifier.
    pub id: String,
    /// Owning capture. Must reference an existing `ScrapedData` row.
    pub scraped_data_id: String,
    /// Extracted title.
    pub title: String,
    /// Extracted body text.
    pub body: String,
    /// Module-defined key/value metadata.
    pub metadata: serde_json::Value,
    /// Module that produced this record.
    pub module: String,
    /// Module-defined score (e.g. relevance or enrollment figure).
    pub score: Option<f64>,
    /// When the record was derived.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedData {
    /// Create a new derived record.
    pub fn new(scraped_data_id: &str, module: &str, title: String, body: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scraped_data_id: scraped_data_id.to_string(),
            title,
            body,
            metadata: serde_json::json!({}),
            module: module.to_string(),
            score: None,
            processed_at: Utc::now(),
        }
    }

    /// Attach a score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
