//! Data models for CourseHarvest.

mod job;
mod processed;
mod scraped;
mod source;

pub use job::{Job, JobStatus, JobType, ModelError};
pub use processed::ProcessedData;
pub use scraped::ScrapedData;
pub use source::Source;
