//! # vidladder-progress
//!
//! Turns the text a transcode script and ffmpeg print into structured
//! progress.
//!
//! - [`markers`] holds stateless scrapers (one line in, one value out).
//! - [`ConversionProgress`] keeps the per-job state: the current stage and
//!   the last percentage reported, so updates never go backwards.
//!
//! ## Example
//!
//! ```
//! use vidladder_progress::{ConversionProgress, Observation, OutputStream};
//!
//! let mut tracker = ConversionProgress::new(120.0);
//! let found = tracker.observe_line(OutputStream::Stderr, "frame=1500 time=00:01:00.00 speed=2.0x");
//!
//! match &found[0] {
//!     Observation::Progress(update) => assert_eq!(update.progress, 17),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert_eq!(found[1], Observation::Speed(2.0));
//! ```

pub mod markers;
mod tracker;

pub use tracker::{
    overall_percent, stage_percent, ConversionProgress, Observation, OutputStream,
    MAX_RUNNING_PERCENT, STAGES,
};
