//! Source model for configured data origins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured origin of ingestible data.
///
/// Each source is bound to one registered module by name. The module's
/// scraper (and optional analyzer) handles everything source-specific;
/// the rest of the system only sees this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier for this source (operator-assigned slug).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Origin locator (page URL or endpoint reference).
    pub url: String,
    /// Name of the registered module that handles this source.
    pub module: String,
    /// Inactive sources are skipped by automatic runs.
    pub active: bool,
    /// Module-specific options (key/value).
    pub config: serde_json::Value,
    /// When the source was added.
    pub created_at: DateTime<Utc>,
    /// When the source was last scraped successfully.
    pub last_scraped: Option<DateTime<Utc>>,
}

impl Source {
    /// Create a new active source.
    pub fn new(id: String, name: String, url: String, module: String) -> Self {
        Self {
            id,
            name,
            url,
            module,
            active: true,
            config: serde_json::json!({}),
            created_at: Utc::now(),
            last_scraped: None,
        }
    }

    /// Look up a string option from the source config.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}
