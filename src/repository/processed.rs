//! Derived record repository for SQLite persistence.

use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

use super::{parse_datetime, to_option, Result};
use crate::models::ProcessedData;

fn processed_from_row(row: &Row) -> rusqlite::Result<ProcessedData> {
    Ok(ProcessedData {
        id: row.get("id")?,
        scraped_data_id: row.get("scraped_data_id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        metadata: serde_json::from_str(&row.get::<_, String>("metadata")?).unwrap_or_default(),
        module: row.get("module")?,
        score: row.get("score")?,
        processed_at: parse_datetime(&row.get::<_, String>("processed_at")?),
    })
}

/// SQLite-backed derived record repository.
pub struct ProcessedDataRepository {
    db_path: PathBuf,
}

impl ProcessedDataRepository {
    /// Create a new derived record repository, initializing the schema.
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
        // A derived record cannot outlive its capture.
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS processed_data (
                id TEXT PRIMARY KEY,
                scraped_data_id TEXT NOT NULL
                    REFERENCES scraped_data(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                module TEXT NOT NULL,
                score REAL,
                processed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_processed_scraped
                ON processed_data(scraped_data_id);
        "#,
        )?;
        Ok(())
    }

    /// Get a derived record by ID.
    pub fn get(&self, id: &str) -> Result<Option<ProcessedData>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM processed_data WHERE id = ?")?;
        to_option(stmt.query_row(params![id], processed_from_row))
    }

    /// Insert a new derived record.
    pub fn insert(&self, data: &ProcessedData) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO processed_data (id, scraped_data_id, title, body, metadata,
                                        module, score, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                data.id,
                data.scraped_data_id,
                data.title,
                data.body,
                serde_json::to_string(&data.metadata)?,
                data.module,
                data.score,
                data.processed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All derived records for one capture, in processing order.
    pub fn for_scraped(&self, scraped_data_id: &str) -> Result<Vec<ProcessedData>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM processed_data WHERE scraped_data_id = ? ORDER BY processed_at, id",
        )?;
        let rows = stmt
            .query_map(params![scraped_data_id], processed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of derived records for one capture.
    pub fn count_for_scraped(&self, scraped_data_id: &str) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_data WHERE scraped_data_id = ?",
            params![scraped_data_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScrapedData, Source};
    use crate::repository::{ScrapedDataRepository, SourceRepository};

    #[test]
    fn derived_record_requires_existing_capture() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("test.db");
        SourceRepository::new(&db).unwrap();
        ScrapedDataRepository::new(&db).unwrap();
        let repo = ProcessedDataRepository::new(&db).unwrap();

        let orphan = ProcessedData::new("missing", "m", "t".into(), "b".into());
        assert!(repo.insert(&orphan).is_err());
    }

    #[test]
    fn records_fall_with_their_capture() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("test.db");
        let sources = SourceRepository::new(&db).unwrap();
        let scraped = ScrapedDataRepository::new(&db).unwrap();
        let repo = ProcessedDataRepository::new(&db).unwrap();

        sources
            .save(&Source::new(
                "s1".into(),
                "S1".into(),
                "http://s1".into(),
                "m".into(),
            ))
            .unwrap();
        let mut capture = ScrapedData::new("s1", "http://s1", b"x".to_vec(), Some(200));
        capture.fetched_at = chrono::Utc::now() - chrono::Duration::days(10);
        scraped.insert(&capture).unwrap();

        let record = ProcessedData::new(&capture.id, "m", "Title".into(), "Body".into())
            .with_score(0.5);
        repo.insert(&record).unwrap();
        assert_eq!(repo.count_for_scraped(&capture.id).unwrap(), 1);

        scraped
            .purge_older_than("s1", chrono::Utc::now())
            .unwrap();
        assert_eq!(repo.count_for_scraped(&capture.id).unwrap(), 0);
    }
}
