//! Job repository for SQLite persistence.
//!
//! Job rows are written only by the supervisor handling that invocation;
//! no two invocations ever touch the same row.

use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

use super::{parse_datetime, parse_datetime_opt, to_option, Result};
use crate::models::{Job, JobStatus, JobType};

fn job_from_row(row: &Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get("id")?,
        job_type: JobType::from_str(&row.get::<_, String>("job_type")?)
            .unwrap_or(JobType::Scrape),
        source_id: row.get("source_id")?,
        module: row.get("module")?,
        status: JobStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(JobStatus::Failed),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        started_at: parse_datetime_opt(row.get::<_, Option<String>>("started_at")?),
        finished_at: parse_datetime_opt(row.get::<_, Option<String>>("finished_at")?),
        items_produced: row.get::<_, i64>("items_produced")? as u64,
        error: row.get("error")?,
    })
}

/// SQLite-backed job repository.
pub struct JobRepository {
    db_path: PathBuf,
}

impl JobRepository {
    /// Create a new job repository, initializing the schema.
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
        // No foreign key on source_id: deleting a job must never touch
        // content, and job history outlives registry or source changes.
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                job_type TEXT NOT NULL,
                source_id TEXT NOT NULL,
                module TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                items_produced INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_source
                ON jobs(source_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_status
                ON jobs(status);
        "#,
        )?;
        Ok(())
    }

    /// Get a job by ID.
    pub fn get(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?")?;
        to_option(stmt.query_row(params![id], job_from_row))
    }

    /// Insert a new job row.
    pub fn insert(&self, job: &Job) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO jobs (id, job_type, source_id, module, status, created_at,
                              started_at, finished_at, items_produced, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                job.id,
                job.job_type.as_str(),
                job.source_id,
                job.module,
                job.status.as_str(),
                job.created_at.to_rfc3339(),
                job.started_at.map(|dt| dt.to_rfc3339()),
                job.finished_at.map(|dt| dt.to_rfc3339()),
                job.items_produced as i64,
                job.error,
            ],
        )?;
        Ok(())
    }

    /// Persist the mutable lifecycle fields of a job.
    pub fn update(&self, job: &Job) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE jobs SET status = ?2, started_at = ?3, finished_at = ?4,
                            items_produced = ?5, error = ?6
            WHERE id = ?1
            "#,
            params![
                job.id,
                job.status.as_str(),
                job.started_at.map(|dt| dt.to_rfc3339()),
                job.finished_at.map(|dt| dt.to_rfc3339()),
                job.items_produced as i64,
                job.error,
            ],
        )?;
        Ok(())
    }

    /// Most recent jobs first, up to `limit` (0 = all).
    pub fn recent(&self, limit: usize) -> Result<Vec<Job>> {
        let conn = self.connect()?;
        let sql = if limit > 0 {
            format!(
                "SELECT * FROM jobs ORDER BY created_at DESC LIMIT {}",
                limit
            )
        } else {
            "SELECT * FROM jobs ORDER BY created_at DESC".to_string()
        };
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// All jobs for one source, most recent first.
    pub fn for_source(&self, source_id: &str) -> Result<Vec<Job>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM jobs WHERE source_id = ? ORDER BY created_at DESC")?;
        let jobs = stmt
            .query_map(params![source_id], job_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Total number of job rows.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_update_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JobRepository::new(&dir.path().join("test.db")).unwrap();

        let mut job = Job::new(JobType::Scrape, "catalog", "course_catalog");
        repo.insert(&job).unwrap();

        let loaded = repo.get(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Pending);
        assert!(loaded.finished_at.is_none());

        job.start().unwrap();
        job.complete(7).unwrap();
        repo.update(&job).unwrap();

        let loaded = repo.get(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.items_produced, 7);
        assert!(loaded.started_at.is_some());
        assert!(loaded.finished_at.is_some());
    }
}
