//! The structured-data import workflow as an explicit state machine.
//!
//! ```text
//! Idle -> FileSelected -> Analyzing -> Reviewing -> Executing -> Monitoring -> Done
//!              ^              |            ^            |                      |
//!              +-- failure ---+            +-- failure -+                      |
//!  Idle / FileSelected <---------------------- close ---------------------------+
//! ```
//!
//! Every transition is a method on [`ImportWorkflow`] that checks the
//! current [`WorkflowState`] and either moves to the next state or
//! returns [`CoreError::InvalidTransition`] leaving the state untouched.
//! Network calls happen outside this module; callers report their
//! results through the `complete_*` / `fail_*` methods.

use crate::analysis::AnalysisResult;
use crate::decisions::{DecisionModel, ExecuteRequest};
use crate::error::CoreError;
use crate::file_selection::{validate_file, SelectedFile};
use crate::job::{Job, JobOutcome};
use crate::types::JobId;
use crate::upload_config::UploadConfig;

/// Fallback when the analysis request fails without a usable message.
pub const ANALYZE_FALLBACK_MESSAGE: &str = "Failed to analyze file. Please try again.";

/// Fallback when the execution request fails without a usable message.
pub const EXECUTE_FALLBACK_MESSAGE: &str = "Failed to execute upload. Please try again.";

/// Fallback when a status poll fails without a usable message.
pub const POLL_FALLBACK_MESSAGE: &str = "Failed to fetch status";

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Where the import currently stands, with the data valid in that state.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    FileSelected {
        file: SelectedFile,
    },
    Analyzing {
        file: SelectedFile,
    },
    Reviewing {
        file: SelectedFile,
        model: DecisionModel,
    },
    Executing {
        file: SelectedFile,
        model: DecisionModel,
    },
    Monitoring {
        file: SelectedFile,
        model: DecisionModel,
        job_id: JobId,
        latest: Option<Job>,
    },
    Done {
        file: SelectedFile,
        model: DecisionModel,
        job: Job,
        outcome: JobOutcome,
    },
}

/// Data-free label for a [`WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowPhase {
    Idle,
    FileSelected,
    Analyzing,
    Reviewing,
    Executing,
    Monitoring,
    Done,
}

impl WorkflowPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FileSelected => "file_selected",
            Self::Analyzing => "analyzing",
            Self::Reviewing => "reviewing",
            Self::Executing => "executing",
            Self::Monitoring => "monitoring",
            Self::Done => "done",
        }
    }

    /// A request is in flight; the selection cannot be cleared.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Analyzing | Self::Executing)
    }
}

impl WorkflowState {
    pub fn phase(&self) -> WorkflowPhase {
        match self {
            Self::Idle => WorkflowPhase::Idle,
            Self::FileSelected { .. } => WorkflowPhase::FileSelected,
            Self::Analyzing { .. } => WorkflowPhase::Analyzing,
            Self::Reviewing { .. } => WorkflowPhase::Reviewing,
            Self::Executing { .. } => WorkflowPhase::Executing,
            Self::Monitoring { .. } => WorkflowPhase::Monitoring,
            Self::Done { .. } => WorkflowPhase::Done,
        }
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        match self {
            Self::Idle => None,
            Self::FileSelected { file }
            | Self::Analyzing { file }
            | Self::Reviewing { file, .. }
            | Self::Executing { file, .. }
            | Self::Monitoring { file, .. }
            | Self::Done { file, .. } => Some(file),
        }
    }

    pub fn model(&self) -> Option<&DecisionModel> {
        match self {
            Self::Reviewing { model, .. }
            | Self::Executing { model, .. }
            | Self::Monitoring { model, .. }
            | Self::Done { model, .. } => Some(model),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// One import, from file selection to the closed progress view.
#[derive(Debug, Clone)]
pub struct ImportWorkflow {
    config: UploadConfig,
    state: WorkflowState,
    analyze_error: Option<String>,
    execute_error: Option<String>,
    poll_error: Option<String>,
}

impl ImportWorkflow {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            state: WorkflowState::Idle,
            analyze_error: None,
            execute_error: None,
            poll_error: None,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.state.phase()
    }

    /// Inline error of the file selection / analysis step.
    pub fn analyze_error(&self) -> Option<&str> {
        self.analyze_error.as_deref()
    }

    /// Inline error of the execution step.
    pub fn execute_error(&self) -> Option<&str> {
        self.execute_error.as_deref()
    }

    /// Transient banner from the most recent failed status poll.
    pub fn poll_error(&self) -> Option<&str> {
        self.poll_error.as_deref()
    }

    pub fn model(&self) -> Option<&DecisionModel> {
        self.state.model()
    }

    /// Decisions are editable only while reviewing.
    pub fn model_mut(&mut self) -> Result<&mut DecisionModel, CoreError> {
        let phase = self.phase();
        match &mut self.state {
            WorkflowState::Reviewing { model, .. } => Ok(model),
            _ => Err(CoreError::InvalidTransition {
                action: "edit decisions",
                phase: phase.as_str(),
            }),
        }
    }

    /// Job being observed, if any.
    pub fn job_id(&self) -> Option<&str> {
        match &self.state {
            WorkflowState::Monitoring { job_id, .. } => Some(job_id),
            WorkflowState::Done { job, .. } => Some(&job.job_id),
            _ => None,
        }
    }

    /// Most recent job status document.
    pub fn latest_job(&self) -> Option<&Job> {
        match &self.state {
            WorkflowState::Monitoring { latest, .. } => latest.as_ref(),
            WorkflowState::Done { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        match &self.state {
            WorkflowState::Done { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    // -- file selection --

    /// Validate and select a file, discarding any previous analysis.
    ///
    /// A rejected file leaves the current selection untouched and only
    /// sets the inline error.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), CoreError> {
        let phase = self.phase();
        if !matches!(
            phase,
            WorkflowPhase::Idle | WorkflowPhase::FileSelected | WorkflowPhase::Reviewing
        ) {
            return Err(self.invalid("select a file", phase));
        }

        if let Err(err) = validate_file(&file, &self.config) {
            self.analyze_error = Some(err.user_message());
            return Err(err);
        }

        self.state = WorkflowState::FileSelected { file };
        self.analyze_error = None;
        self.execute_error = None;
        Ok(())
    }

    /// Discard the selection and everything downstream of it.
    ///
    /// Refused while a request is in flight. Clearing during monitoring
    /// only stops observing the job; the backend keeps running it.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        let phase = self.phase();
        if phase.is_busy() {
            return Err(self.invalid("clear the selected file", phase));
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.state = WorkflowState::Idle;
        self.analyze_error = None;
        self.execute_error = None;
        self.poll_error = None;
    }

    // -- analysis --

    /// `FileSelected -> Analyzing`. Returns the file to upload.
    pub fn begin_analysis(&mut self) -> Result<SelectedFile, CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::FileSelected { file } => {
                self.analyze_error = None;
                self.state = WorkflowState::Analyzing { file: file.clone() };
                Ok(file)
            }
            other => Err(self.restore_invalid(other, "analyze")),
        }
    }

    /// `Analyzing -> Reviewing`, seeding default decisions.
    ///
    /// A structurally unusable analysis is treated as a failed request.
    pub fn complete_analysis(&mut self, analysis: AnalysisResult) -> Result<(), CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Analyzing { file } => match DecisionModel::new(analysis) {
                Ok(model) => {
                    self.state = WorkflowState::Reviewing { file, model };
                    Ok(())
                }
                Err(err) => {
                    self.analyze_error = Some(err.user_message());
                    self.state = WorkflowState::FileSelected { file };
                    Err(err)
                }
            },
            other => Err(self.restore_invalid(other, "complete analysis")),
        }
    }

    /// `Analyzing -> FileSelected`, keeping the file for a retry.
    pub fn fail_analysis(&mut self, message: Option<String>) -> Result<(), CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Analyzing { file } => {
                self.analyze_error = Some(non_blank(message, ANALYZE_FALLBACK_MESSAGE));
                self.state = WorkflowState::FileSelected { file };
                Ok(())
            }
            other => Err(self.restore_invalid(other, "fail analysis")),
        }
    }

    // -- execution --

    /// Evaluated against the current decisions on every call.
    pub fn can_execute(&self) -> bool {
        match &self.state {
            WorkflowState::Reviewing { model, .. } => model.can_execute(),
            _ => false,
        }
    }

    /// `Reviewing -> Executing`. Returns the request body to submit.
    ///
    /// An empty payload or closed override gate is rejected locally; the
    /// state stays `Reviewing` and the execution error is set.
    pub fn begin_execution(&mut self) -> Result<ExecuteRequest, CoreError> {
        let phase = self.phase();
        let WorkflowState::Reviewing { model, .. } = &self.state else {
            return Err(self.invalid("execute", phase));
        };

        let request = match model.build_request() {
            Ok(request) => request,
            Err(err) => {
                self.execute_error = Some(err.user_message());
                return Err(err);
            }
        };

        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Reviewing { file, model } => {
                self.execute_error = None;
                self.state = WorkflowState::Executing { file, model };
                Ok(request)
            }
            other => Err(self.restore_invalid(other, "execute")),
        }
    }

    /// `Executing -> Monitoring`.
    pub fn complete_execution(&mut self, job_id: impl Into<JobId>) -> Result<(), CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Executing { file, model } => {
                self.poll_error = None;
                self.state = WorkflowState::Monitoring {
                    file,
                    model,
                    job_id: job_id.into(),
                    latest: None,
                };
                Ok(())
            }
            other => Err(self.restore_invalid(other, "start monitoring")),
        }
    }

    /// `Executing -> Reviewing` with decisions intact.
    pub fn fail_execution(&mut self, message: Option<String>) -> Result<(), CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Executing { file, model } => {
                self.execute_error = Some(non_blank(message, EXECUTE_FALLBACK_MESSAGE));
                self.state = WorkflowState::Reviewing { file, model };
                Ok(())
            }
            other => Err(self.restore_invalid(other, "fail execution")),
        }
    }

    // -- monitoring --

    /// Record a polled status. Returns the outcome on the first terminal
    /// observation, which moves the workflow to `Done`.
    pub fn observe_job(&mut self, job: Job) -> Result<Option<JobOutcome>, CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Monitoring {
                file,
                model,
                job_id,
                latest,
            } => {
                if job.job_id != job_id {
                    let err = CoreError::Validation(format!(
                        "Status for job '{}' does not belong to job '{job_id}'",
                        job.job_id
                    ));
                    self.state = WorkflowState::Monitoring {
                        file,
                        model,
                        job_id,
                        latest,
                    };
                    return Err(err);
                }

                self.poll_error = None;
                match job.outcome() {
                    Some(outcome) => {
                        self.state = WorkflowState::Done {
                            file,
                            model,
                            job,
                            outcome: outcome.clone(),
                        };
                        Ok(Some(outcome))
                    }
                    None => {
                        self.state = WorkflowState::Monitoring {
                            file,
                            model,
                            job_id,
                            latest: Some(job),
                        };
                        Ok(None)
                    }
                }
            }
            other => Err(self.restore_invalid(other, "record job status")),
        }
    }

    /// Show a transient poll failure. Does not alter the job state.
    pub fn record_poll_error(&mut self, message: Option<String>) -> Result<(), CoreError> {
        let phase = self.phase();
        if phase != WorkflowPhase::Monitoring {
            return Err(self.invalid("record a poll failure", phase));
        }
        self.poll_error = Some(non_blank(message, POLL_FALLBACK_MESSAGE));
        Ok(())
    }

    /// Close the progress view. Only allowed after a terminal status.
    ///
    /// A fully successful job resets to `Idle`. Otherwise the file stays
    /// selected so a fresh import of it can begin.
    pub fn close_monitor(&mut self) -> Result<(), CoreError> {
        match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::Done { file, outcome, .. } => {
                if outcome.is_full_success() {
                    self.reset();
                } else {
                    self.reset();
                    self.state = WorkflowState::FileSelected { file };
                }
                Ok(())
            }
            other @ WorkflowState::Monitoring { .. } => {
                self.state = other;
                Err(CoreError::Validation(
                    "The import is still running; wait for it to finish before closing"
                        .to_string(),
                ))
            }
            other => Err(self.restore_invalid(other, "close the progress view")),
        }
    }

    // -- helpers --

    fn invalid(&self, action: &'static str, phase: WorkflowPhase) -> CoreError {
        CoreError::InvalidTransition {
            action,
            phase: phase.as_str(),
        }
    }

    /// Put `state` back and build the transition error for it.
    fn restore_invalid(&mut self, state: WorkflowState, action: &'static str) -> CoreError {
        let phase = state.phase();
        self.state = state;
        self.invalid(action, phase)
    }
}

fn non_blank(message: Option<String>, fallback: &str) -> String {
    message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
