//! Source repository for SQLite persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

use super::{parse_datetime, parse_datetime_opt, to_option, Result};
use crate::models::Source;

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get("id")?,
        name: row.get("name")?,
        url: row.get("url")?,
        module: row.get("module")?,
        active: row.get::<_, i64>("active")? != 0,
        config: serde_json::from_str(&row.get::<_, String>("config")?).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        last_scraped: parse_datetime_opt(row.get::<_, Option<String>>("last_scraped")?),
    })
}

/// SQLite-backed source repository.
pub struct SourceRepository {
    db_path: PathBuf,
}

impl SourceRepository {
    /// Create a new source repository, initializing the schema.
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
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                module TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                config TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                last_scraped TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sources_module
                ON sources(module) WHERE active = 1;
        "#,
        )?;
        Ok(())
    }

    /// Get a source by ID.
    pub fn get(&self, id: &str) -> Result<Option<Source>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sources WHERE id = ?")?;
        to_option(stmt.query_row(params![id], source_from_row))
    }

    /// Get all sources, ordered by creation time.
    pub fn get_all(&self) -> Result<Vec<Source>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sources ORDER BY created_at")?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Get all active sources, the set automatic runs pick up.
    pub fn get_active(&self) -> Result<Vec<Source>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM sources WHERE active = 1 ORDER BY created_at")?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Save a source (insert or update).
    pub fn save(&self, source: &Source) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO sources (id, name, url, module, active, config, created_at, last_scraped)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                url = excluded.url,
                module = excluded.module,
                active = excluded.active,
                config = excluded.config,
                last_scraped = excluded.last_scraped
            "#,
            params![
                source.id,
                source.name,
                source.url,
                source.module,
                source.active as i64,
                serde_json::to_string(&source.config)?,
                source.created_at.to_rfc3339(),
                source.last_scraped.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Check if a source exists.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sources WHERE id = ?",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Flip the active flag (soft deactivate/reactivate).
    pub fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn.execute(
            "UPDATE sources SET active = ? WHERE id = ?",
            params![active as i64, id],
        )?;
        Ok(rows > 0)
    }

    /// Check whether any active source is bound to the given module.
    pub fn any_active_for_module(&self, module: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sources WHERE module = ? AND active = 1",
            params![module],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Count sources bound to the given module.
    pub fn count_for_module(&self, module: &str) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sources WHERE module = ?",
            params![module],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Update last scraped timestamp.
    pub fn update_last_scraped(&self, id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE sources SET last_scraped = ? WHERE id = ?",
            params![timestamp.to_rfc3339(), id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_repo() -> (tempfile::TempDir, SourceRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = SourceRepository::new(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    #[test]
    fn save_and_get_roundtrip() {
        let (_dir, repo) = temp_repo();
        let mut source = Source::new(
            "catalog".into(),
            "Course Catalog".into(),
            "https://courses.example.org/courses".into(),
            "course_catalog".into(),
        );
        source.config = serde_json::json!({"page_size": 50});
        repo.save(&source).unwrap();

        let loaded = repo.get("catalog").unwrap().unwrap();
        assert_eq!(loaded.name, "Course Catalog");
        assert_eq!(loaded.module, "course_catalog");
        assert!(loaded.active);
        assert_eq!(loaded.config["page_size"], 50);
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn set_active_filters_automatic_set() {
        let (_dir, repo) = temp_repo();
        let source = Source::new("a".into(), "A".into(), "http://a".into(), "m".into());
        repo.save(&source).unwrap();

        assert!(repo.any_active_for_module("m").unwrap());
        repo.set_active("a", false).unwrap();
        assert!(!repo.any_active_for_module("m").unwrap());
        assert!(repo.get_active().unwrap().is_empty());
        assert_eq!(repo.get_all().unwrap().len(), 1);
    }
}
