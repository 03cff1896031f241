use crate::probe::check_tools;
use crate::server::AppContext;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use vidladder_common::JobHandle;

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/cancel", post(cancel))
        .route("/tools", get(get_tools))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    running: bool,
    job: Option<JobHandle>,
    listeners: usize,
}

async fn status(State(ctx): State<AppContext>) -> impl IntoResponse {
    let job = ctx.coordinator.current();
    Json(StatusResponse {
        running: job.is_some(),
        job,
        listeners: ctx.events.listener_count(),
    })
}

/// Same as an `abort` message on the event socket.
async fn cancel(State(ctx): State<AppContext>) -> impl IntoResponse {
    let cancelled = ctx.coordinator.cancel();
    Json(serde_json::json!({ "cancelled": cancelled }))
}

async fn get_tools(State(ctx): State<AppContext>) -> impl IntoResponse {
    let tools = check_tools(&ctx.config.transcode.shell, &ctx.config.tools.ffprobe);
    Json(tools)
}
