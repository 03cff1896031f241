//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which lays out upload/output directories and a
//! fake transcode script in a temp dir and builds a full [`AppContext`]
//! around a [`FakeProber`], so no ffmpeg is needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;

use vidladder::config::Config;
use vidladder::events::Listener;
use vidladder::probe::{MediaProber, VideoInfo};
use vidladder::server::{create_router, AppContext};
use vidladder_common::{Error, Event, Result};

/// Prober that returns a canned answer.
pub struct FakeProber {
    result: std::result::Result<VideoInfo, String>,
}

impl FakeProber {
    pub fn with_duration(secs: f64) -> Self {
        Self {
            result: Ok(VideoInfo {
                width: 1920,
                height: 1080,
                duration_secs: Some(secs),
                codec: "h264".to_string(),
                bit_rate: Some(4 * 1024 * 1024),
            }),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, _path: &Path) -> Result<VideoInfo> {
        self.result.clone().map_err(Error::probe)
    }
}

/// Temp directory layout plus a fully wired [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub temp: TempDir,
}

impl TestHarness {
    /// Harness whose transcode script has the given bash body.
    pub fn with_script(body: &str) -> Self {
        Self::with_script_and_prober(body, FakeProber::with_duration(10.0))
    }

    pub fn with_script_and_prober(body: &str, prober: FakeProber) -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let script = temp.path().join("tool.bash");
        std::fs::write(&script, body).expect("failed to write script");

        let mut config = Config::default();
        config.paths.upload_dir = temp.path().join("uploads");
        config.paths.output_dir = temp.path().join("output");
        config.transcode.script = script;
        config.transcode.shell = "bash".to_string();
        config.tools.opener = "true".to_string();
        vidladder::config::ensure_directories(&config).expect("failed to create dirs");

        let ctx = AppContext::new(config, Arc::new(prober));
        Self { ctx, temp }
    }

    /// Harness pointing at a script that does not exist.
    pub fn without_script() -> Self {
        let harness = Self::with_script("exit 0\n");
        std::fs::remove_file(&harness.ctx.config.transcode.script).expect("remove script");
        harness
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone(), None)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.ctx.config.paths.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.ctx.config.paths.output_dir
    }

    /// Write a dummy input file into the upload directory.
    pub fn stage_input(&self, name: &str) -> PathBuf {
        let path = self.upload_dir().join(name);
        std::fs::write(&path, b"not really a video").expect("failed to stage input");
        path
    }

    /// Number of files left in the upload directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Build a `multipart/form-data` POST with a single file field.
pub fn multipart_request(uri: &str, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let boundary = "vidladder-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Helper to get response body as string
pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

/// Everything currently queued for `listener`.
pub fn drain(listener: &mut Listener) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = listener.events.try_recv() {
        events.push((*event).clone());
    }
    events
}

/// Log messages among `events`.
pub fn log_messages(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

/// Overall percentages among `events`, in order.
pub fn progress_values(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Progress(update) => Some(update.progress),
            _ => None,
        })
        .collect()
}
