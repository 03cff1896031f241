//! Everything under `/output`: the transcoded files themselves, plus an
//! endpoint that opens a job's folder on the server's desktop.

use crate::server::{AppContext, AppError};
use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tower_http::services::ServeDir;
use vidladder_common::Error;

pub fn output_routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .route("/open", post(open_output))
        .fallback_service(ServeDir::new(&ctx.config.paths.output_dir))
}

#[derive(Debug, Deserialize)]
struct OpenQuery {
    path: Option<String>,
}

async fn open_output(
    State(ctx): State<AppContext>,
    Query(query): Query<OpenQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let requested = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::validation("No path given"))?;

    let dir = resolve_output_path(&ctx.config.paths.output_dir, Path::new(&requested))?;
    tracing::info!("Opening {:?} with {}", dir, ctx.config.tools.opener);

    let status = tokio::process::Command::new(&ctx.config.tools.opener)
        .arg(&dir)
        .status()
        .await
        .map_err(|e| Error::internal(format!("Cannot open folder: {}", e)))?;

    if !status.success() {
        return Err(Error::internal(format!(
            "Cannot open folder: {} exited with {}",
            ctx.config.tools.opener, status
        ))
        .into());
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Resolve `requested` to an existing directory inside `root`.
///
/// Accepts either a path as returned by the upload endpoint or one relative
/// to the output root. Anything resolving outside the root is rejected.
pub fn resolve_output_path(root: &Path, requested: &Path) -> Result<PathBuf, Error> {
    let root = root
        .canonicalize()
        .map_err(|_| Error::not_found(format!("Output directory {}", root.display())))?;

    let candidates = [requested.to_path_buf(), root.join(requested)];
    for candidate in candidates {
        let Ok(resolved) = candidate.canonicalize() else {
            continue;
        };
        if resolved.starts_with(&root) && resolved.is_dir() {
            return Ok(resolved);
        }
    }

    Err(Error::validation(format!(
        "{} is not a folder inside the output directory",
        requested.display()
    )))
}
