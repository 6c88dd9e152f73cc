//! Access to the remote workflow service.
//!
//! The rest of the crate only sees [`WorkflowServiceClient`]; [`DatabricksClient`]
//! is the HTTP implementation used by the binary.

mod databricks;

use crate::error::ClientError;
use crate::model::{Job, RunNowResponse, RunRecord, SubmissionPayload};
use async_trait::async_trait;

pub use databricks::DatabricksClient;

#[async_trait]
pub trait WorkflowServiceClient: Send + Sync {
    /// All jobs visible to the caller; task definitions only when `expand_tasks`.
    async fn list_jobs(&self, expand_tasks: bool) -> Result<Vec<Job>, ClientError>;

    /// One job with its full task list and job-level parameters.
    async fn get_job(&self, job_id: i64) -> Result<Job, ClientError>;

    /// Runs of a job, most recent first.
    async fn list_runs(
        &self,
        job_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RunRecord>, ClientError>;

    async fn run_now(&self, payload: &SubmissionPayload) -> Result<RunNowResponse, ClientError>;
}
