//! Running transcode jobs.
//!
//! - [`TranscodeRunner`] launches the script and reads its output
//! - [`JobCoordinator`] enforces the single running job and handles cancellation
//! - [`TranscodePipeline`] takes an upload through probing, transcoding and
//!   renaming the output directory, broadcasting progress along the way

mod coordinator;
mod pipeline;
mod runner;

pub use coordinator::{FinishedJob, JobCoordinator, JobOutcome, RunningJob};
pub use pipeline::{newest_subdirectory, JobReport, JobRequest, TranscodePipeline};
pub use runner::{pump_output, terminate, TranscodeRunner};
