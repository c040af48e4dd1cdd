use async_trait::async_trait;
use smartstore_core::analysis::AnalysisResult;
use smartstore_core::decisions::{ExecuteRequest, ExecuteResponse};
use smartstore_core::file_selection::SelectedFile;
use smartstore_core::job::{FailedRecord, Job};

use crate::api::SmartStorageApi;
use crate::error::ApiError;

/// The backend operations an import needs.
///
/// [`SmartStorageApi`] is the HTTP implementation; the import session and
/// the monitor only see this trait.
#[async_trait]
pub trait ImportBackend: Send + Sync {
    /// Analyze a file's structure.
    async fn analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, ApiError>;

    /// Start an import job.
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ApiError>;

    /// Current status of a job.
    async fn job_status(&self, job_id: &str) -> Result<Job, ApiError>;

    /// Records a job failed to import.
    async fn failed_records(&self, job_id: &str) -> Result<Vec<FailedRecord>, ApiError>;
}

#[async_trait]
impl ImportBackend for SmartStorageApi {
    async fn analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, ApiError> {
        self.analyze_file(file).await
    }

    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ApiError> {
        self.execute_upload(request).await
    }

    async fn job_status(&self, job_id: &str) -> Result<Job, ApiError> {
        self.get_job_status(job_id).await
    }

    async fn failed_records(&self, job_id: &str) -> Result<Vec<FailedRecord>, ApiError> {
        self.get_failed_records(job_id).await
    }
}
