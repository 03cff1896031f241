//! vidladder - upload a video, transcode it into a resolution ladder, and
//! watch the progress live.
//!
//! This library crate exposes the server pieces for integration testing.

pub mod config;
pub mod conversion;
pub mod events;
pub mod probe;
pub mod server;
