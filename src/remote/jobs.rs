//! Jobs service capability.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::model::Properties;

/// Identifying summary of a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    /// Numeric id assigned by the jobs service.
    pub job_id: u64,
    /// The job's display name.
    pub name: String,
}

/// Operations the jobs adapter needs from the remote jobs API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobsService: Send + Sync {
    /// Creates a job from its settings and returns the assigned job id.
    async fn create_job(&self, settings: &Properties) -> Result<u64, RemoteError>;

    /// Replaces the settings of an existing job.
    async fn reset_job(&self, job_id: u64, settings: &Properties) -> Result<(), RemoteError>;

    /// Fetches a job's summary, or [`RemoteError::NotFound`] if it no longer
    /// exists.
    async fn get_job(&self, job_id: u64) -> Result<JobSummary, RemoteError>;

    /// Deletes a job.
    async fn delete_job(&self, job_id: u64) -> Result<(), RemoteError>;

    /// Lists all remote jobs whose name matches exactly.
    async fn find_jobs_by_name(&self, name: &str) -> Result<Vec<JobSummary>, RemoteError>;
}
