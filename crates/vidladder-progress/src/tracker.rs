//! Per-job progress state.
//!
//! The transcode script encodes the same input once per target resolution,
//! announcing each pass with a `Processing <N>p...` line. ffmpeg's elapsed
//! time therefore restarts from zero for every stage, and the overall
//! percentage is a coarse blend: each stage is worth 33 points and the
//! in-stage percentage is compressed into a third of that.

use vidladder_common::{Event, ProgressUpdate};

use crate::markers::{is_error_line, parse_elapsed_secs, parse_resolution_marker, parse_speed};

/// Target resolutions, in the order the transcode script processes them.
pub const STAGES: [&str; 3] = ["720p", "1080p", "2160p"];

/// Points contributed by each completed stage.
const STAGE_WEIGHT: u32 = 33;

/// Highest percentage reported while the transcoder is still running.
/// 100 is reserved for the completion event.
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Something noteworthy found in a line of transcoder output.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The transcoder moved on to another target resolution.
    StageChanged {
        index: usize,
        resolution: &'static str,
    },
    /// Overall progress advanced.
    Progress(ProgressUpdate),
    /// Current encoding speed.
    Speed(f64),
    /// The line looks like an error. Informational only.
    Error(String),
}

impl Observation {
    /// Convert into the event broadcast to listeners.
    pub fn into_event(self) -> Event {
        match self {
            Observation::StageChanged { resolution, .. } => {
                Event::info(format!("Processing {resolution} resolution..."))
            }
            Observation::Progress(update) => Event::Progress(update),
            Observation::Speed(speed) => Event::speed(speed),
            Observation::Error(line) => Event::error(format!("Transcode error: {line}")),
        }
    }
}

/// Percentage through the current stage, clamped to 99.
///
/// Returns `None` when `total_duration` is not a positive finite number.
pub fn stage_percent(elapsed: f64, total_duration: f64) -> Option<u8> {
    if !(total_duration.is_finite() && total_duration > 0.0) || !elapsed.is_finite() {
        return None;
    }
    let pct = (elapsed.max(0.0) / total_duration * 100.0).round();
    Some(pct.min(f64::from(MAX_RUNNING_PERCENT)) as u8)
}

/// Overall percentage for `stage_index` given the in-stage percentage, clamped to 99.
pub fn overall_percent(stage_index: usize, stage_pct: u8) -> u8 {
    let base = stage_index as u32 * STAGE_WEIGHT;
    let within = (f64::from(stage_pct) / 3.0).round() as u32;
    (base + within).min(u32::from(MAX_RUNNING_PERCENT)) as u8
}

/// Progress state for one transcoding job.
#[derive(Debug, Clone)]
pub struct ConversionProgress {
    total_duration: f64,
    current: usize,
    last_progress: u8,
}

impl ConversionProgress {
    /// Start tracking a job whose input lasts `total_duration` seconds.
    pub fn new(total_duration: f64) -> Self {
        Self {
            total_duration,
            current: 0,
            last_progress: 0,
        }
    }

    pub fn total_stages(&self) -> usize {
        STAGES.len()
    }

    /// 0-based index of the stage being processed.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_resolution(&self) -> &'static str {
        STAGES[self.current]
    }

    /// Last overall percentage handed out by [`ConversionProgress::status`].
    pub fn last_progress(&self) -> u8 {
        self.last_progress
    }

    /// Advance to the stage named by a `Processing <N>p...` marker.
    ///
    /// Returns the new stage index when the marker names a known stage other
    /// than the current one. Unknown resolutions are ignored.
    pub fn check_resolution_change(&mut self, line: &str) -> Option<usize> {
        let label = parse_resolution_marker(line)?;
        let index = STAGES.iter().position(|s| *s == label)?;
        if index == self.current {
            return None;
        }
        self.current = index;
        Some(index)
    }

    /// Build a progress update for `elapsed` seconds into the current stage.
    ///
    /// Returns `None` unless the overall percentage strictly exceeds the last
    /// one reported, so repeated or stale time markers produce nothing.
    pub fn status(&mut self, elapsed: f64) -> Option<ProgressUpdate> {
        let stage_pct = stage_percent(elapsed, self.total_duration)?;
        let progress = overall_percent(self.current, stage_pct);
        if progress <= self.last_progress {
            return None;
        }
        self.last_progress = progress;

        let resolution = self.current_resolution();
        Some(ProgressUpdate {
            progress,
            resolution: resolution.to_string(),
            stage: format!("Processing {resolution}"),
            current_stage: Some(self.current + 1),
            total_stages: self.total_stages(),
            resolution_progress: Some(stage_pct),
        })
    }

    /// Inspect one line of output.
    ///
    /// Stage markers are honoured on both streams. Time, speed and error
    /// scanning only applies to stderr, where ffmpeg writes its status.
    pub fn observe_line(&mut self, stream: OutputStream, line: &str) -> Vec<Observation> {
        let mut found = Vec::new();

        if let Some(index) = self.check_resolution_change(line) {
            found.push(Observation::StageChanged {
                index,
                resolution: STAGES[index],
            });
        }

        if stream == OutputStream::Stdout {
            return found;
        }

        if let Some(update) = parse_elapsed_secs(line).and_then(|elapsed| self.status(elapsed)) {
            found.push(Observation::Progress(update));
        }

        if let Some(speed) = parse_speed(line) {
            found.push(Observation::Speed(speed));
        }

        if is_error_line(line) {
            found.push(Observation::Error(line.trim().to_string()));
        }

        found
    }
}
