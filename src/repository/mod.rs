//! Repository layer for SQLite persistence.
//!
//! Each entity has its own repository struct holding the database path and
//! opening a connection per call. Referential integrity between sources,
//! captures, and derived records is enforced by SQLite foreign keys.

mod job;
mod processed;
mod scraped;
mod source;

pub use job::JobRepository;
pub use processed::ProcessedDataRepository;
pub use scraped::ScrapedDataRepository;
pub use source::SourceRepository;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open a connection with the pragmas every repository relies on.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // journal_mode returns a row, so pragma_update would reject it
    let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    Ok(conn)
}

/// Convert a single-row query result into an `Option`.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Handle to the data store, passed to module functions and the supervisor.
///
/// Cheap to clone; every repository accessor shares the same database file.
#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Open the database and initialize all schemas.
    pub fn open(db_path: &Path) -> Result<Self> {
        SourceRepository::new(db_path)?;
        JobRepository::new(db_path)?;
        ScrapedDataRepository::new(db_path)?;
        ProcessedDataRepository::new(db_path)?;
        Ok(Self {
            db_path: db_path.to_path_buf(),
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn sources(&self) -> SourceRepository {
        SourceRepository::attached(&self.db_path)
    }

    pub fn jobs(&self) -> JobRepository {
        JobRepository::attached(&self.db_path)
    }

    pub fn scraped(&self) -> ScrapedDataRepository {
        ScrapedDataRepository::attached(&self.db_path)
    }

    pub fn processed(&self) -> ProcessedDataRepository {
        ProcessedDataRepository::attached(&self.db_path)
    }
}
