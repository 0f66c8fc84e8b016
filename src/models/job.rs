//! Job model: one tracked execution attempt of a scraper or analyzer.
//!
//! Jobs move through `pending -> running -> completed | failed` and are
//! immutable once terminal. Retries are new jobs, never re-entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Scrape,
    Analyze,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Analyze => "analyze",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scrape" => Some(Self::Scrape),
            "analyze" => Some(Self::Analyze),
            _ => None,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Raised on a state transition the lifecycle does not allow.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid job transition: {} -> {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// One execution attempt of a scraper or analyzer against a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier.
    pub id: String,
    /// Kind of work.
    pub job_type: JobType,
    /// Target source.
    pub source_id: String,
    /// Module name captured at launch time. Later registry changes do not
    /// retroactively alter job history.
    pub module: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// When the job record was created.
    pub created_at: DateTime<Utc>,
    /// When execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Records produced by the invocation (may be partial on failure).
    pub items_produced: u64,
    /// Captured error message for failed jobs.
    pub error: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(job_type: JobType, source_id: &str, module: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            source_id: source_id.to_string(),
            module: module.to_string(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            items_produced: 0,
            error: None,
        }
    }

    /// Transition `pending -> running` and stamp the start time.
    pub fn start(&mut self) -> Result<(), ModelError> {
        match self.status {
            JobStatus::Pending => {
                self.status = JobStatus::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            from => Err(ModelError::InvalidTransition {
                from,
                to: JobStatus::Running,
            }),
        }
    }

    /// Transition `running -> completed` with the reported item count.
    pub fn complete(&mut self, items_produced: u64) -> Result<(), ModelError> {
        match self.status {
            JobStatus::Running => {
                self.status = JobStatus::Completed;
                self.items_produced = items_produced;
                self.finished_at = Some(Utc::now());
                Ok(())
            }
            from => Err(ModelError::InvalidTransition {
                from,
                to: JobStatus::Completed,
            }),
        }
    }

    /// Transition `running -> failed`, recording the error message and any
    /// partial item count the invocation reported before failing.
    pub fn fail(&mut self, message: String, items_produced: u64) -> Result<(), ModelError> {
        match self.status {
            JobStatus::Running => {
                self.status = JobStatus::Failed;
                self.items_produced = items_produced;
                self.error = Some(message);
                self.finished_at = Some(Utc::now());
                Ok(())
            }
            from => Err(ModelError::InvalidTransition {
                from,
                to: JobStatus::Failed,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending_with_no_timestamps() {
        let job = Job::new(JobType::Scrape, "src", "mod");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn lifecycle_stamps_timestamps_in_order() {
        let mut job = Job::new(JobType::Scrape, "src", "mod");
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_none());

        job.complete(5).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.items_produced, 5);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn cannot_complete_without_running() {
        let mut job = Job::new(JobType::Analyze, "src", "mod");
        assert!(job.complete(1).is_err());
        assert!(job.fail("boom".into(), 0).is_err());
    }

    #[test]
    fn terminal_jobs_reject_further_transitions() {
        let mut job = Job::new(JobType::Scrape, "src", "mod");
        job.start().unwrap();
        job.fail("network unreachable".into(), 2).unwrap();
        assert!(job.status.is_terminal());
        assert_eq!(job.items_produced, 2);
        assert!(job.start().is_err());
        assert!(job.complete(1).is_err());
    }
}
