//! Drives an [`ImportWorkflow`] against an [`ImportBackend`].
//!
//! The workflow decides what is allowed; this module performs the
//! requests and reports their results back to it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use smartstore_core::decisions::DecisionModel;
use smartstore_core::error::CoreError;
use smartstore_core::file_selection::SelectedFile;
use smartstore_core::job::{FailedRecord, JobOutcome};
use smartstore_core::types::JobId;
use smartstore_core::upload_config::UploadConfig;
use smartstore_core::workflow::{ImportWorkflow, WorkflowPhase};
use tokio_util::sync::CancellationToken;

use crate::backend::ImportBackend;
use crate::error::ImportError;
use crate::monitor::{run_monitor, MonitorEvent, MonitorExit};

/// One structured-data import against a backend.
pub struct ImportSession<B: ?Sized> {
    backend: Arc<B>,
    workflow: ImportWorkflow,
    poll_interval: Duration,
}

impl<B: ImportBackend + ?Sized> ImportSession<B> {
    pub fn new(backend: Arc<B>, config: UploadConfig) -> Self {
        Self {
            backend,
            poll_interval: config.polling_interval,
            workflow: ImportWorkflow::new(config),
        }
    }

    pub fn workflow(&self) -> &ImportWorkflow {
        &self.workflow
    }

    /// Decisions of the analysis under review.
    pub fn decisions_mut(&mut self) -> Result<&mut DecisionModel, ImportError> {
        Ok(self.workflow.model_mut()?)
    }

    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), ImportError> {
        self.workflow.select_file(file)?;
        Ok(())
    }

    /// Read the file's metadata and select it.
    pub fn select_path(&mut self, path: impl AsRef<Path>) -> Result<(), ImportError> {
        let file = SelectedFile::from_path(path)?;
        self.select_file(file)
    }

    pub fn clear(&mut self) -> Result<(), ImportError> {
        self.workflow.clear()?;
        Ok(())
    }

    /// Upload the selected file for analysis. On success the workflow is
    /// `Reviewing` with default decisions; on failure it is back to
    /// `FileSelected` with the error message set.
    pub async fn analyze(&mut self) -> Result<(), ImportError> {
        let file = self.workflow.begin_analysis()?;

        match self.backend.analyze(&file).await {
            Ok(analysis) => {
                tracing::info!(
                    file = %file.name,
                    analysis_id = %analysis.analysis_id,
                    schemas = analysis.schemas_detected.len(),
                    variance = analysis.variance_level.as_str(),
                    "Analysis complete",
                );
                self.workflow.complete_analysis(analysis)?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Analysis failed");
                self.workflow.fail_analysis(Some(e.user_message()))?;
                Err(e.into())
            }
        }
    }

    /// Submit the current decisions. Returns the new job id; the workflow
    /// moves to `Monitoring`.
    pub async fn execute(&mut self) -> Result<JobId, ImportError> {
        let request = self.workflow.begin_execution()?;

        match self.backend.execute(&request).await {
            Ok(response) => {
                tracing::info!(
                    analysis_id = %request.analysis_id,
                    job_id = %response.job_id,
                    "Import job started",
                );
                self.workflow.complete_execution(response.job_id.clone())?;
                Ok(response.job_id)
            }
            Err(e) => {
                tracing::warn!(analysis_id = %request.analysis_id, error = %e, "Execution failed");
                self.workflow.fail_execution(Some(e.user_message()))?;
                Err(e.into())
            }
        }
    }

    /// Poll the running job until it finishes or `cancel` fires.
    ///
    /// `on_event` sees every monitor event together with the workflow
    /// after the event has been applied.
    pub async fn monitor<F>(
        &mut self,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<JobOutcome, ImportError>
    where
        F: FnMut(&MonitorEvent, &ImportWorkflow),
    {
        let phase = self.workflow.phase();
        let job_id = match (phase, self.workflow.job_id()) {
            (WorkflowPhase::Monitoring, Some(id)) => id.to_string(),
            _ => {
                return Err(CoreError::InvalidTransition {
                    action: "monitor the job",
                    phase: phase.as_str(),
                }
                .into())
            }
        };

        let workflow = &mut self.workflow;
        let exit = run_monitor(
            self.backend.as_ref(),
            &job_id,
            self.poll_interval,
            cancel,
            |event| {
                let applied = match &event {
                    MonitorEvent::Status(job) | MonitorEvent::Completed(job) => {
                        workflow.observe_job(job.clone()).map(|_| ())
                    }
                    MonitorEvent::PollError(message) => {
                        workflow.record_poll_error(Some(message.clone()))
                    }
                };
                if let Err(e) = applied {
                    tracing::warn!(error = %e, "Ignoring monitor event");
                }
                on_event(&event, workflow);
            },
        )
        .await;

        match exit {
            MonitorExit::Terminal(job) => match self.workflow.outcome() {
                Some(outcome) => Ok(outcome.clone()),
                None => Err(CoreError::Internal(format!(
                    "job {job_id} reported terminal status '{}' but the import did not finish",
                    job.status.as_str()
                ))
                .into()),
            },
            MonitorExit::Cancelled => Err(ImportError::Cancelled { job_id }),
        }
    }

    /// Records rejected by a finished job.
    pub async fn failed_records(&self) -> Result<Vec<FailedRecord>, ImportError> {
        let phase = self.workflow.phase();
        let Some(job_id) = self.workflow.job_id().filter(|_| phase == WorkflowPhase::Done) else {
            return Err(CoreError::InvalidTransition {
                action: "fetch failed records",
                phase: phase.as_str(),
            }
            .into());
        };
        Ok(self.backend.failed_records(job_id).await?)
    }

    /// Close the progress view after a terminal status.
    pub fn close(&mut self) -> Result<(), ImportError> {
        self.workflow.close_monitor()?;
        Ok(())
    }
}
