//! One upload, end to end: prepare, probe, transcode, finalize.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};
use vidladder_common::{Error, Event, JobId, JobName, ProgressUpdate, Result};
use vidladder_progress::{ConversionProgress, OutputStream, STAGES};

use super::coordinator::{JobCoordinator, JobOutcome};

/// Filesystem timestamps come from a coarser clock than `Utc::now()`.
const MTIME_SLACK: Duration = Duration::from_millis(500);
use crate::events::Broadcaster;
use crate::probe::MediaProber;

/// An accepted upload waiting to be transcoded.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub name: JobName,
    /// Staged upload. Deleted once the job ends, whatever the outcome.
    pub input: PathBuf,
    /// File name as sent by the client, for logging.
    pub original_name: Option<String>,
}

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub name: JobName,
    pub output_dir: PathBuf,
}

pub struct TranscodePipeline {
    coordinator: Arc<JobCoordinator>,
    events: Arc<Broadcaster>,
    prober: Arc<dyn MediaProber>,
    output_root: PathBuf,
}

impl TranscodePipeline {
    pub fn new(
        coordinator: Arc<JobCoordinator>,
        events: Arc<Broadcaster>,
        prober: Arc<dyn MediaProber>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            coordinator,
            events,
            prober,
            output_root: output_root.into(),
        }
    }

    /// Run `request` to completion on its own task.
    ///
    /// The job keeps going even if the caller stops waiting for it.
    pub async fn spawn(self: &Arc<Self>, request: JobRequest) -> Result<JobReport> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(request).await })
            .await
            .map_err(|e| Error::internal(format!("Transcode task failed: {}", e)))?
    }

    /// Run `request` on the current task.
    pub async fn run(&self, request: JobRequest) -> Result<JobReport> {
        let input = request.input.clone();
        let result = self.execute(request).await;

        match tokio::fs::remove_file(&input).await {
            Ok(()) => debug!("Removed upload {:?}", input),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {:?}: {}", input, e),
        }

        result
    }

    async fn execute(&self, request: JobRequest) -> Result<JobReport> {
        info!(
            "Received {} for output {}",
            request.original_name.as_deref().unwrap_or("upload"),
            request.name
        );

        self.coordinator.runner().check()?;
        self.coordinator.ensure_idle()?;

        let target = self.output_root.join(request.name.as_str());
        if tokio::fs::try_exists(&target).await? {
            info!("Removing existing output directory {:?}", target);
            tokio::fs::remove_dir_all(&target).await?;
        }
        tokio::fs::create_dir_all(&self.output_root).await?;

        self.events.broadcast(Event::info("Analyzing video file..."));
        debug!("Probing {:?} with {}", request.input, self.prober.name());
        let video = match self.prober.probe(&request.input).await {
            Ok(video) => video,
            Err(e) => {
                self.events
                    .broadcast(Event::error(format!("Failed to analyze video: {}", e)));
                return Err(e);
            }
        };
        self.events.broadcast(Event::info(video.summary()));

        let total_duration = match video.duration_secs {
            Some(secs) if secs > 0.0 => secs,
            _ => {
                self.events.broadcast(Event::warning(
                    "Video duration unknown, progress will not be reported",
                ));
                0.0
            }
        };

        let job = self
            .coordinator
            .start(request.name.clone(), &request.input, &self.output_root)?;
        let job_id = job.handle.id;
        self.events.broadcast(Event::info("Starting conversion..."));

        let mut tracker = ConversionProgress::new(total_duration);
        let events = Arc::clone(&self.events);

        let finished = job
            .drive(|stream, line| {
                match stream {
                    OutputStream::Stdout => {
                        debug!(job_id = %job_id, "transcoder: {}", line);
                        events.broadcast(Event::info(line.as_str()));
                    }
                    OutputStream::Stderr => trace!(job_id = %job_id, "ffmpeg: {}", line),
                }
                for observation in tracker.observe_line(stream, &line) {
                    events.broadcast(observation.into_event());
                }
            })
            .await;

        let finished = match finished {
            Ok(finished) => finished,
            Err(e) => {
                self.coordinator.release(job_id);
                self.events
                    .broadcast(Event::error(format!("Transcoder process error: {}", e)));
                return Err(e);
            }
        };

        match self.coordinator.on_exit(&finished) {
            JobOutcome::Completed => {}
            JobOutcome::Cancelled => return Err(Error::Cancelled),
            JobOutcome::Failed { code } => {
                let err = Error::Runtime { code };
                self.events.broadcast(Event::error(err.to_string()));
                return Err(err);
            }
        }

        let started = SystemTime::from(finished.handle.started_at);
        let started = started.checked_sub(MTIME_SLACK).unwrap_or(started);
        let output_dir = match self.finalize_output(&request.name, started).await {
            Ok(dir) => dir,
            Err(e) => {
                self.events.broadcast(Event::error(e.to_string()));
                return Err(e);
            }
        };

        self.events.broadcast(Event::success("Video conversion complete!"));
        self.events
            .broadcast(Event::Progress(ProgressUpdate::completed(STAGES.len())));

        Ok(JobReport {
            job_id,
            name: request.name,
            output_dir,
        })
    }

    /// Give the directory the script just wrote the requested name.
    ///
    /// Only directories modified since `started` qualify, so a script that
    /// wrote nothing never claims an earlier job's output.
    async fn finalize_output(&self, name: &JobName, started: SystemTime) -> Result<PathBuf> {
        let target = self.output_root.join(name.as_str());
        let newest = newest_subdirectory(&self.output_root, started)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "No new output directory in {}",
                    self.output_root.display()
                ))
            })?;

        if newest != target {
            tokio::fs::rename(&newest, &target).await?;
            info!("Renamed output {:?} -> {:?}", newest, target);
        }
        Ok(tokio::fs::canonicalize(&target).await.unwrap_or(target))
    }
}

/// Most recently modified directory directly under `root`, ignoring any
/// not modified since `since`.
pub async fn newest_subdirectory(root: &Path, since: SystemTime) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if modified < since {
            continue;
        }
        if newest.as_ref().map_or(true, |(best, _)| modified >= *best) {
            newest = Some((modified, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
