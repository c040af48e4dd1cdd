//! Server-owned import jobs and their terminal outcomes.

use serde::{Deserialize, Serialize};

use crate::analysis::StorageKind;
use crate::types::JobId;

/// Lifecycle of an import job on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl JobStatus {
    /// No transition follows a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithErrors | Self::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }

    /// Heading shown in the progress view.
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Processing => "Processing",
            Self::Completed => "Upload Complete!",
            Self::CompletedWithErrors => "Upload Completed with Errors",
            Self::Failed => "Upload Failed",
        }
    }
}

/// A table or collection produced by the import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCreated {
    pub name: String,
    #[serde(default)]
    pub record_count: u64,
    pub storage_type: StorageKind,
}

/// Status document returned by the job status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub progress_stage: Option<String>,
    #[serde(default)]
    pub progress_current: Option<u64>,
    #[serde(default)]
    pub progress_total: Option<u64>,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub entities_created: Vec<EntityCreated>,
    #[serde(default)]
    pub successful_records: Option<u64>,
    #[serde(default)]
    pub failed_records: Option<u64>,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Progress line such as `Inserting records: 40.0% (400 / 1000 records)`,
    /// only while processing.
    pub fn progress_label(&self) -> Option<String> {
        if self.status != JobStatus::Processing {
            return None;
        }
        let pct = self.progress_percentage?;
        let mut line = match &self.progress_stage {
            Some(stage) => format!("{stage}: {pct:.1}%"),
            None => format!("{pct:.1}%"),
        };
        if let (Some(current), Some(total)) = (self.progress_current, self.progress_total) {
            line.push_str(&format!(" ({current} / {total} records)"));
        }
        Some(line)
    }

    /// Final outcome, or `None` while the job is still running.
    pub fn outcome(&self) -> Option<JobOutcome> {
        let summary = || JobSummary {
            entities_created: self.entities_created.clone(),
            successful_records: self.successful_records.unwrap_or(0),
            failed_records: self.failed_records.unwrap_or(0),
            success_rate: self.success_rate,
        };

        match self.status {
            JobStatus::Queued | JobStatus::Processing => None,
            JobStatus::Completed => Some(JobOutcome::Completed(summary())),
            JobStatus::CompletedWithErrors => Some(JobOutcome::CompletedWithErrors(summary())),
            JobStatus::Failed => Some(JobOutcome::Failed {
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "The import job failed".to_string()),
            }),
        }
    }
}

/// Record counts reported on completion.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub entities_created: Vec<EntityCreated>,
    pub successful_records: u64,
    pub failed_records: u64,
    pub success_rate: Option<f64>,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobSummary),
    /// Partial success: some records were rejected. Not an error.
    CompletedWithErrors(JobSummary),
    /// Fatal for this job; a new import must be started.
    Failed { message: String },
}

impl JobOutcome {
    pub fn is_full_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn status(&self) -> JobStatus {
        match self {
            Self::Completed(_) => JobStatus::Completed,
            Self::CompletedWithErrors(_) => JobStatus::CompletedWithErrors,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// A record the backend could not import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    #[serde(default)]
    pub record_index: Option<u64>,
    #[serde(default)]
    pub schema_id: Option<String>,
    #[serde(default, alias = "error_message")]
    pub error: String,
    #[serde(default)]
    pub record: serde_json::Value,
}
