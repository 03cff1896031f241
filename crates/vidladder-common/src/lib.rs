//! Vidladder-Common: Shared types and error handling.
//!
//! This crate provides the pieces shared by the progress tracker and the
//! server:
//!
//! - **Events**: The tagged [`Event`] union pushed to connected clients
//! - **Job naming**: Validation of requested output folder names
//! - **Error Handling**: The common [`Error`] type and result alias
//!
//! # Examples
//!
//! ```
//! use vidladder_common::{Event, LogLevel, JobName};
//!
//! let name = JobName::parse("trailer_2024").unwrap();
//! assert_eq!(name.as_str(), "trailer_2024");
//!
//! let event = Event::log(LogLevel::Info, "Starting conversion...");
//! let json = serde_json::to_string(&event).unwrap();
//! assert!(json.contains(r#""type":"log""#));
//! ```

pub mod error;
pub mod events;
pub mod job;

pub use error::{Error, Result};
pub use events::{ClientMessage, Event, LogLevel, ProgressUpdate};
pub use job::{JobHandle, JobId, JobName};
