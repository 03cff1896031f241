//! `POST /upload?folderName=<name>`: stage the file and run the job.

use crate::conversion::JobRequest;
use crate::server::{AppContext, AppError};
use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use vidladder_common::{Error, JobName};

/// Multipart field carrying the video.
const VIDEO_FIELD: &str = "video";

pub fn upload_routes(ctx: &AppContext) -> Router<AppContext> {
    let limit = usize::try_from(ctx.config.transcode.max_upload_bytes).unwrap_or(usize::MAX);
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(limit))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "folderName")]
    folder_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    success: bool,
    message: String,
    output_dir: String,
}

struct StagedUpload {
    file: StagedFile,
    original_name: Option<String>,
    size: u64,
}

/// Upload on disk that is deleted on drop unless handed over with
/// [`StagedFile::keep`]. Covers errors and handlers dropped mid-stream.
struct StagedFile {
    path: Option<PathBuf>,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    /// Stop guarding the file; the caller now owns its cleanup.
    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Discarded staged upload {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove staged upload {:?}: {}", path, e),
        }
    }
}

async fn upload(
    State(ctx): State<AppContext>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let name = JobName::parse(query.folder_name.as_deref().unwrap_or_default())?;

    let staged = stage_upload(&mut multipart, &ctx.config.paths.upload_dir)
        .await?
        .ok_or_else(|| Error::validation("No video file uploaded"))?;

    tracing::info!(
        "Upload staged: {:?} ({} bytes) as {:?}",
        staged.original_name,
        staged.size,
        staged.file.path()
    );

    let report = ctx
        .pipeline
        .spawn(JobRequest {
            name,
            input: staged.file.keep(),
            original_name: staged.original_name,
        })
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Conversion succeeded".to_string(),
        output_dir: report.output_dir.display().to_string(),
    }))
}

/// Write the first `video` field into `upload_dir`. Other fields are ignored.
async fn stage_upload(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> Result<Option<StagedUpload>, Error> {
    while let Some(mut field) = multipart.next_field().await.map_err(invalid_upload)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        tokio::fs::create_dir_all(upload_dir).await?;
        let file = StagedFile::new(upload_dir.join(staged_file_name(original_name.as_deref())));

        let size = write_field(&mut field, file.path()).await?;
        return Ok(Some(StagedUpload {
            file,
            original_name,
            size,
        }));
    }

    Ok(None)
}

async fn write_field(field: &mut Field<'_>, path: &Path) -> Result<u64, Error> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(invalid_upload)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

fn invalid_upload(e: axum::extract::multipart::MultipartError) -> Error {
    Error::validation(format!("Invalid upload: {}", e))
}

/// Random name for the staged file, keeping a plain extension so ffprobe
/// can still guess the container.
fn staged_file_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}
