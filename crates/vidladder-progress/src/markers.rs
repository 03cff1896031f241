//! Pure scrapers for the markers the transcode script and ffmpeg print.
//!
//! Each function looks at a single line and returns what it found, if
//! anything. None of them keep state.

use regex::Regex;
use std::sync::LazyLock;

static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Processing (\d+)p\.\.\.").expect("invalid resolution regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d+):(\d+(?:\.\d+)?)").expect("invalid time regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)x").expect("invalid speed regex"));

/// Phrase ffmpeg decoders print during normal operation that mentions "error".
const BENIGN_ERROR_PHRASE: &str = "error concealment";

/// Extract the resolution label from a `Processing <N>p...` marker.
///
/// ```
/// use vidladder_progress::markers::parse_resolution_marker;
///
/// assert_eq!(parse_resolution_marker("Processing 1080p..."), Some("1080p".to_string()));
/// assert_eq!(parse_resolution_marker("Processing audio"), None);
/// ```
pub fn parse_resolution_marker(line: &str) -> Option<String> {
    RESOLUTION_RE
        .captures(line)
        .map(|caps| format!("{}p", &caps[1]))
}

/// Extract the elapsed time in seconds from a `time=HH:MM:SS.ss` marker.
///
/// ```
/// use vidladder_progress::markers::parse_elapsed_secs;
///
/// assert_eq!(parse_elapsed_secs("frame=10 time=00:01:30.50 bitrate=N/A"), Some(90.5));
/// assert_eq!(parse_elapsed_secs("time=N/A"), None);
/// ```
pub fn parse_elapsed_secs(line: &str) -> Option<f64> {
    let caps = TIME_RE.captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Extract the realtime multiplier from a `speed=<float>x` marker.
pub fn parse_speed(line: &str) -> Option<f64> {
    SPEED_RE.captures(line)?[1].parse().ok()
}

/// Heuristic error classification for transcoder output.
///
/// A line counts as an error when it mentions "error" in any case, unless it
/// is ffmpeg's "error concealment" diagnostic.
pub fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error") && !lower.contains(BENIGN_ERROR_PHRASE)
}
