//! Common error type used throughout vidladder.
//!
//! Every failure a transcode request can hit funnels into [`Error`], which
//! carries enough context for the HTTP layer to pick a status code via
//! [`Error::http_status`].

/// Common error type for vidladder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation (bad job name, missing file).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transcoding job is already in flight.
    #[error("A conversion job is already running")]
    AlreadyRunning,

    /// The transcode script is missing or cannot be made executable.
    #[error("Transcode script unavailable: {0}")]
    Launch(String),

    /// The operating system refused to start the transcoder process.
    #[error("Transcoder process failed to start: {0}")]
    Spawn(String),

    /// The transcoder exited unsuccessfully.
    #[error("Conversion failed, exit code: {}", display_code(.code))]
    Runtime {
        /// Process exit code, `None` when the process was killed by a signal.
        code: Option<i32>,
    },

    /// The job was cancelled by a client before it finished.
    #[error("Conversion was cancelled")]
    Cancelled,

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The requested resource could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Launch error.
    pub fn launch<S: Into<String>>(msg: S) -> Self {
        Self::Launch(msg.into())
    }

    /// Create a new Spawn error.
    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a new Probe error.
    pub fn probe<S: Into<String>>(msg: S) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::AlreadyRunning => 409,
            Error::Cancelled => 409,
            Error::Probe(_) => 422,
            Error::Launch(_) => 500,
            Error::Spawn(_) => 500,
            Error::Runtime { .. } => 500,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::AlreadyRunning => "already_running",
            Error::Launch(_) => "launch_error",
            Error::Spawn(_) => "spawn_error",
            Error::Runtime { .. } => "runtime_error",
            Error::Cancelled => "cancelled",
            Error::Probe(_) => "probe_error",
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
