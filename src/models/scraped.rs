//! Raw capture model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One immutable raw capture from a source.
///
/// Captures are append-only: a newer capture supersedes an older one but the
/// history is retained for audit until explicitly purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedData {
    /// Unique identifier.
    pub id: String,
    /// Owning source.
    pub source_id: String,
    /// Origin locator at capture time.
    pub url: String,
    /// Raw payload (HTML, JSON, or other serialized form).
    pub payload: Vec<u8>,
    /// SHA-256 of the payload, for change detection across captures.
    pub content_hash: String,
    /// HTTP response status, for HTTP-based modules.
    pub status_code: Option<u16>,
    /// When the capture was taken.
    pub fetched_at: DateTime<Utc>,
}

impl ScrapedData {
    /// Compute SHA-256 hash of a payload.
    pub fn compute_hash(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hex::encode(hasher.finalize())
    }

    /// Create a new capture taken now.
    pub fn new(source_id: &str, url: &str, payload: Vec<u8>, status_code: Option<u16>) -> Self {
        let content_hash = Self::compute_hash(&payload);
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            url: url.to_string(),
            payload,
            content_hash,
            status_code,
            fetched_at: Utc::now(),
        }
    }

    /// Payload decoded as UTF-8, lossily.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_payloads_share_a_hash() {
        let a = ScrapedData::new("s1", "http://a", b"<html></html>".to_vec(), Some(200));
        let b = ScrapedData::new("s1", "http://a", b"<html></html>".to_vec(), Some(200));
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.id, b.id);
    }
}
