//! Fixed-interval job status polling.
//!
//! [`run_monitor`] fetches the job status once immediately and then every
//! `interval` until the job reaches a terminal status or the
//! [`CancellationToken`] fires. Fetch failures, and statuses that belong
//! to another job, are reported to the observer as [`MonitorEvent::PollError`]
//! and never stop the loop. [`MonitorHandle`] runs the same loop
//! on a spawned task and cancels it when dropped.

use std::sync::Arc;
use std::time::Duration;

use smartstore_core::job::Job;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::ImportBackend;

/// Something the monitor observed.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A non-terminal status.
    Status(Job),
    /// A fetch failed; polling continues.
    PollError(String),
    /// The first terminal status. Emitted exactly once, last.
    Completed(Job),
}

/// Why [`run_monitor`] returned.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorExit {
    Terminal(Job),
    Cancelled,
}

/// Poll `job_id` until it is terminal or `cancel` fires.
pub async fn run_monitor<B, F>(
    backend: &B,
    job_id: &str,
    interval: Duration,
    cancel: &CancellationToken,
    mut observer: F,
) -> MonitorExit
where
    B: ImportBackend + ?Sized,
    F: FnMut(MonitorEvent),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(job_id, polls, "Job monitor cancelled");
                return MonitorExit::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        polls += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(job_id, polls, "Job monitor cancelled during fetch");
                return MonitorExit::Cancelled;
            }
            result = backend.job_status(job_id) => result,
        };

        match result {
            Ok(job) if job.job_id != job_id => {
                tracing::warn!(
                    job_id,
                    polls,
                    reported_job_id = %job.job_id,
                    "Status response belongs to another job",
                );
                observer(MonitorEvent::PollError(format!(
                    "Received status for job '{}' while monitoring '{job_id}'",
                    job.job_id
                )));
            }
            Ok(job) if job.is_terminal() => {
                tracing::info!(
                    job_id,
                    polls,
                    status = job.status.as_str(),
                    "Job reached terminal status",
                );
                observer(MonitorEvent::Completed(job.clone()));
                return MonitorExit::Terminal(job);
            }
            Ok(job) => {
                tracing::debug!(
                    job_id,
                    status = job.status.as_str(),
                    progress = ?job.progress_percentage,
                    "Job status",
                );
                observer(MonitorEvent::Status(job));
            }
            Err(e) => {
                tracing::warn!(job_id, polls, error = %e, "Failed to fetch job status");
                observer(MonitorEvent::PollError(e.user_message()));
            }
        }
    }
}

/// A job monitor running on its own task.
///
/// Dropping the handle cancels polling. The backend job itself is not
/// affected.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<MonitorExit>,
    _guard: DropGuard,
}

impl MonitorHandle {
    /// Start polling `job_id`. Events arrive on the returned receiver,
    /// which closes once the monitor stops.
    pub fn spawn<B>(
        backend: Arc<B>,
        job_id: String,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>)
    where
        B: ImportBackend + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            run_monitor(backend.as_ref(), &job_id, interval, &token, |event| {
                // The receiver may already be gone; polling still ends on its own.
                let _ = tx.send(event);
            })
            .await
        });

        let handle = Self {
            _guard: cancel.clone().drop_guard(),
            cancel,
            task,
        };
        (handle, rx)
    }

    /// Stop polling at the next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the monitor task to stop.
    pub async fn join(self) -> Result<MonitorExit, tokio::task::JoinError> {
        let Self { task, _guard, .. } = self;
        let exit = task.await;
        drop(_guard);
        exit
    }
}
