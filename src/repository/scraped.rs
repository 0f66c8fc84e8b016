//! Raw capture repository for SQLite persistence.
//!
//! Captures are append-only. History is retained for audit; trimming it is
//! the explicit `purge_older_than` operation, never a side effect.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

use super::{parse_datetime, to_option, Result};
use crate::models::ScrapedData;

fn scraped_from_row(row: &Row) -> rusqlite::Result<ScrapedData> {
    Ok(ScrapedData {
        id: row.get("id")?,
        source_id: row.get("source_id")?,
        url: row.get("url")?,
        payload: row.get("payload")?,
        content_hash: row.get("content_hash")?,
        status_code: row.get::<_, Option<u16>>("status_code")?,
        fetched_at: parse_datetime(&row.get::<_, String>("fetched_at")?),
    })
}

/// SQLite-backed capture repository.
pub struct ScrapedDataRepository {
    db_path: PathBuf,
}

impl ScrapedDataRepository {
    /// Create a new capture repository, initializing the schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self::attached(db_path);
        repo.init_schema()?;
        Ok(repo)
    }

    /// Attach to an already-initialized database.
    pub(crate) fn attached(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS scraped_data (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL REFERENCES sources(id),
                url TEXT NOT NULL,
                payload BLOB NOT NULL,
                content_hash TEXT NOT NULL,
                status_code INTEGER,
                fetched_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_scraped_source_time
                ON scraped_data(source_id, fetched_at DESC);
        "#,
        )?;
        Ok(())
    }

    /// Get a capture by ID.
    pub fn get(&self, id: &str) -> Result<Option<ScrapedData>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM scraped_data WHERE id = ?")?;
        to_option(stmt.query_row(params![id], scraped_from_row))
    }

    /// Insert a new capture. Captures are never updated afterwards.
    pub fn insert(&self, data: &ScrapedData) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO scraped_data (id, source_id, url, payload, content_hash,
                                      status_code, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.id,
                data.source_id,
                data.url,
                data.payload,
                data.content_hash,
                data.status_code,
                data.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All captures for a source, newest first.
    pub fn for_source(&self, source_id: &str) -> Result<Vec<ScrapedData>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM scraped_data WHERE source_id = ? ORDER BY fetched_at DESC",
        )?;
        let rows = stmt
            .query_map(params![source_id], scraped_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The newest capture for a source, if any.
    pub fn latest_for_source(&self, source_id: &str) -> Result<Option<ScrapedData>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM scraped_data WHERE source_id = ? ORDER BY fetched_at DESC LIMIT 1",
        )?;
        to_option(stmt.query_row(params![source_id], scraped_from_row))
    }

    /// Number of captures held for a source.
    pub fn count_for_source(&self, source_id: &str) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scraped_data WHERE source_id = ?",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete captures for a source older than the cutoff. Derived records
    /// fall with their capture via FK cascade. Returns rows removed.
    pub fn purge_older_than(&self, source_id: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.connect()?;
        let rows = conn.execute(
            "DELETE FROM scraped_data WHERE source_id = ? AND fetched_at < ?",
            params![source_id, cutoff.to_rfc3339()],
        )?;
        Ok(rows as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::repository::SourceRepository;

    fn seeded(dir: &tempfile::TempDir) -> ScrapedDataRepository {
        let db = dir.path().join("test.db");
        let sources = SourceRepository::new(&db).unwrap();
        sources
            .save(&Source::new(
                "s1".into(),
                "S1".into(),
                "http://s1".into(),
                "m".into(),
            ))
            .unwrap();
        ScrapedDataRepository::new(&db).unwrap()
    }

    #[test]
    fn captures_are_ordered_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let repo = seeded(&dir);

        let mut old = ScrapedData::new("s1", "http://s1", b"old".to_vec(), Some(200));
        old.fetched_at = Utc::now() - chrono::Duration::days(2);
        let new = ScrapedData::new("s1", "http://s1", b"new".to_vec(), Some(200));
        repo.insert(&old).unwrap();
        repo.insert(&new).unwrap();

        let all = repo.for_source("s1").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, new.id);
        assert_eq!(repo.latest_for_source("s1").unwrap().unwrap().id, new.id);
    }

    #[test]
    fn purge_is_explicit_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let repo = seeded(&dir);

        let mut old = ScrapedData::new("s1", "http://s1", b"old".to_vec(), Some(200));
        old.fetched_at = Utc::now() - chrono::Duration::days(30);
        let new = ScrapedData::new("s1", "http://s1", b"new".to_vec(), Some(200));
        repo.insert(&old).unwrap();
        repo.insert(&new).unwrap();

        let removed = repo
            .purge_older_than("s1", Utc::now() - chrono::Duration::days(7))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.count_for_source("s1").unwrap(), 1);
    }

    #[test]
    fn capture_requires_existing_source() {
        let dir = tempfile::tempdir().unwrap();
        let repo = seeded(&dir);
        let orphan = ScrapedData::new("nope", "http://x", b"x".to_vec(), None);
        assert!(repo.insert(&orphan).is_err());
    }
}
