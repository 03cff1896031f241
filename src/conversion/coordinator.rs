//! Single-job coordination.
//!
//! At most one transcoder process exists at a time. The check and the spawn
//! happen under the same lock, so two racing uploads can never both start.

use chrono::Utc;
use parking_lot::Mutex;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use vidladder_common::{Error, Event, JobHandle, JobId, JobName, Result};
use vidladder_progress::OutputStream;

use super::runner::{pump_output, terminate, TranscodeRunner};
use crate::events::Broadcaster;

/// How long output is still read after the transcoder exits. Background
/// processes it left behind may hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

struct ActiveJob {
    handle: JobHandle,
    cancel: oneshot::Sender<()>,
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Non-zero exit, or killed by a signal nobody here sent (`code` is `None`).
    Failed { code: Option<i32> },
    Cancelled,
}

/// A job that has been spawned and not yet driven to completion.
pub struct RunningJob {
    pub handle: JobHandle,
    child: Child,
    cancel: oneshot::Receiver<()>,
}

/// Result of [`RunningJob::drive`].
#[derive(Debug)]
pub struct FinishedJob {
    pub handle: JobHandle,
    pub status: ExitStatus,
    pub cancel_requested: bool,
}

enum Step {
    Line(Option<(OutputStream, String)>),
    Cancel(bool),
    Exited(std::io::Result<ExitStatus>),
}

impl RunningJob {
    /// Feed every output line to `on_line` until the process exits.
    ///
    /// A cancellation request sends the termination signal once and keeps
    /// waiting for the exit. Output still buffered after a cancelled exit is
    /// discarded, and a clean exit only waits a short grace period for the rest.
    pub async fn drive<F>(self, mut on_line: F) -> Result<FinishedJob>
    where
        F: FnMut(OutputStream, String),
    {
        let RunningJob {
            handle,
            mut child,
            mut cancel,
        } = self;

        let mut lines = pump_output(&mut child);
        let mut lines_open = true;
        let mut cancel_armed = true;
        let mut cancel_requested = false;

        let status = loop {
            let step = tokio::select! {
                line = lines.recv(), if lines_open => Step::Line(line),
                res = &mut cancel, if cancel_armed => Step::Cancel(res.is_ok()),
                status = child.wait() => Step::Exited(status),
            };

            match step {
                Step::Line(Some((stream, line))) => on_line(stream, line),
                Step::Line(None) => lines_open = false,
                Step::Cancel(requested) => {
                    cancel_armed = false;
                    if requested {
                        cancel_requested = true;
                        info!(job_id = %handle.id, "Terminating transcoder");
                        if let Err(e) = terminate(&mut child) {
                            warn!(job_id = %handle.id, "Failed to signal transcoder: {}", e);
                        }
                    }
                }
                Step::Exited(status) => break status?,
            }
        };

        if !cancel_requested {
            let drain = async {
                while let Some((stream, line)) = lines.recv().await {
                    on_line(stream, line);
                }
            };
            if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
                warn!(job_id = %handle.id, "Transcoder output still open after exit, no longer reading it");
            }
        }

        debug!(job_id = %handle.id, "Transcoder exited with {}", status);
        Ok(FinishedJob {
            handle,
            status,
            cancel_requested,
        })
    }
}

/// Owns the optional running job.
pub struct JobCoordinator {
    runner: TranscodeRunner,
    events: Arc<Broadcaster>,
    active: Mutex<Option<ActiveJob>>,
}

impl JobCoordinator {
    pub fn new(runner: TranscodeRunner, events: Arc<Broadcaster>) -> Self {
        Self {
            runner,
            events,
            active: Mutex::new(None),
        }
    }

    pub fn runner(&self) -> &TranscodeRunner {
        &self.runner
    }

    /// Fail with [`Error::AlreadyRunning`] if a job is in flight.
    pub fn ensure_idle(&self) -> Result<()> {
        if self.active.lock().is_some() {
            return Err(Error::AlreadyRunning);
        }
        Ok(())
    }

    /// Handle of the running job, if any.
    pub fn current(&self) -> Option<JobHandle> {
        self.active.lock().as_ref().map(|job| job.handle.clone())
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Spawn the transcoder for `name`.
    ///
    /// Rejects the request without spawning anything if a job is running.
    pub fn start(&self, name: JobName, input: &Path, output_dir: &Path) -> Result<RunningJob> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(Error::AlreadyRunning);
        }

        // Taken before the spawn so nothing the script writes predates it
        let started_at = Utc::now();
        let child = match self.runner.spawn(input, output_dir) {
            Ok(child) => child,
            Err(e) => {
                drop(active);
                warn!("Failed to start transcoder: {}", e);
                self.events
                    .broadcast(Event::error(format!("Transcoder process error: {}", e)));
                return Err(e);
            }
        };

        let handle = JobHandle {
            id: JobId::new(),
            name,
            pid: child.id(),
            started_at,
        };
        let (cancel_tx, cancel_rx) = oneshot::channel();

        *active = Some(ActiveJob {
            handle: handle.clone(),
            cancel: cancel_tx,
        });
        info!(job_id = %handle.id, pid = ?handle.pid, "Started job {}", handle.name);

        Ok(RunningJob {
            handle,
            child,
            cancel: cancel_rx,
        })
    }

    /// Cancel the running job. Returns false, and broadcasts nothing, when idle.
    pub fn cancel(&self) -> bool {
        let Some(job) = self.active.lock().take() else {
            debug!("Cancel requested with no job running");
            return false;
        };

        info!(job_id = %job.handle.id, "Cancelling job {}", job.handle.name);
        // The receiver is gone only if the job is already finishing.
        let _ = job.cancel.send(());
        self.events.broadcast(Event::warning("Job cancelled by user"));
        true
    }

    /// Free the job slot if it still belongs to `id`.
    pub fn release(&self, id: JobId) -> bool {
        let mut active = self.active.lock();
        match active.as_ref() {
            Some(job) if job.handle.id == id => {
                *active = None;
                true
            }
            _ => false,
        }
    }

    /// Release the job slot and classify how the job ended.
    pub fn on_exit(&self, finished: &FinishedJob) -> JobOutcome {
        let still_ours = self.release(finished.handle.id);

        // A missing slot means cancel() already took it.
        let outcome = if finished.cancel_requested || !still_ours {
            JobOutcome::Cancelled
        } else if finished.status.success() {
            JobOutcome::Completed
        } else {
            JobOutcome::Failed {
                code: finished.status.code(),
            }
        };

        info!(job_id = %finished.handle.id, "Job {} ended: {:?}", finished.handle.name, outcome);
        outcome
    }
}
