use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Built frontend to serve for any unmatched route
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Interval between WebSocket pings sent to each client
    #[serde(default = "default_ping_interval")]
    pub ws_ping_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_ping_interval() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            ws_ping_interval_secs: default_ping_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Where uploaded files are staged until their job ends
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Root directory the transcode script writes variants into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Script invoked as `<shell> <script> <input> <output_dir>`
    #[serde(default = "default_script")]
    pub script: PathBuf,

    #[serde(default = "default_shell")]
    pub shell: String,

    /// Largest accepted upload in bytes (default: 1 GiB)
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

fn default_script() -> PathBuf {
    PathBuf::from("tool.bash")
}
fn default_shell() -> String {
    "bash".to_string()
}
fn default_max_upload() -> u64 {
    1024 * 1024 * 1024
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            script: default_script(),
            shell: default_shell(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,

    /// Command used to reveal an output folder on the server's desktop
    #[serde(default = "default_opener")]
    pub opener: String,
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

#[cfg(target_os = "macos")]
fn default_opener() -> String {
    "open".to_string()
}

#[cfg(not(target_os = "macos"))]
fn default_opener() -> String {
    "xdg-open".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe: default_ffprobe(),
            opener: default_opener(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Events queued per listener before new ones are dropped for it
    #[serde(default = "default_listener_buffer")]
    pub listener_buffer: usize,
}

fn default_listener_buffer() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            listener_buffer: default_listener_buffer(),
        }
    }
}
