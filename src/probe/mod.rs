//! Media probing and external tool checks.
//!
//! The pipeline only needs a handful of facts about the uploaded file, the
//! most important being its duration, which scales every progress update.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use vidladder_common::{Error, Result};

/// Facts about the first video stream of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Stream duration, or the container duration when the stream has none.
    pub duration_secs: Option<f64>,
    pub codec: String,
    /// Bits per second, when the container reports it.
    pub bit_rate: Option<u64>,
}

impl VideoInfo {
    /// One-line description broadcast to clients before the job starts.
    pub fn summary(&self) -> String {
        let duration = match self.duration_secs {
            Some(secs) => format!("{:.2}s", secs),
            None => "unknown".to_string(),
        };
        let bitrate = match self.bit_rate {
            Some(bps) => format!("{} Kbps", bps / 1024),
            None => "unknown".to_string(),
        };
        format!(
            "Video info - duration: {}, resolution: {}x{}, codec: {}, bitrate: {}",
            duration, self.width, self.height, self.codec, bitrate
        )
    }
}

/// Something that can inspect a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    async fn probe(&self, path: &Path) -> Result<VideoInfo>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    codec_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// [`MediaProber`] backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration,bit_rate,codec_name:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::probe(format!("{} not found", self.binary.display()))
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::probe(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        parse_ffprobe_json(&output.stdout)
    }
}

/// Parse the JSON printed by the ffprobe invocation above.
pub fn parse_ffprobe_json(raw: &[u8]) -> Result<VideoInfo> {
    let parsed: FfprobeOutput = serde_json::from_slice(raw)
        .map_err(|e| Error::probe(format!("Invalid ffprobe output: {}", e)))?;

    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| Error::probe("No video stream found"))?;

    let container_duration = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    let duration_secs = stream
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .or(container_duration);

    Ok(VideoInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        duration_secs,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
        bit_rate: stream.bit_rate.and_then(|b| b.parse().ok()),
    })
}

/// Availability of an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    pub path: Option<PathBuf>,
}

/// Resolve a tool by name or path.
pub fn check_tool(name: &str) -> ToolInfo {
    let path = which::which(name).ok();
    ToolInfo {
        name: name.to_string(),
        available: path.is_some(),
        path,
    }
}

/// Check the tools a job needs: the shell that runs the script, ffprobe and
/// ffmpeg (invoked by the script itself).
pub fn check_tools(shell: &str, ffprobe: &Path) -> Vec<ToolInfo> {
    vec![
        check_tool(shell),
        check_tool(&ffprobe.to_string_lossy()),
        check_tool("ffmpeg"),
    ]
}
