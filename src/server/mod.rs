use crate::config::Config;
use crate::conversion::{JobCoordinator, TranscodePipeline, TranscodeRunner};
use crate::events::Broadcaster;
use crate::probe::{FfprobeProber, MediaProber};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod error;
pub mod routes_api;
pub mod routes_output;
pub mod routes_upload;
pub mod routes_ws;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub events: Arc<Broadcaster>,
    pub coordinator: Arc<JobCoordinator>,
    pub pipeline: Arc<TranscodePipeline>,
}

impl AppContext {
    /// Wire up the broadcaster, coordinator and pipeline around `prober`.
    pub fn new(config: Config, prober: Arc<dyn MediaProber>) -> Self {
        let events = Arc::new(Broadcaster::new(config.events.listener_buffer));
        let runner = TranscodeRunner::from_config(&config.transcode);
        let coordinator = Arc::new(JobCoordinator::new(runner, Arc::clone(&events)));
        let pipeline = Arc::new(TranscodePipeline::new(
            Arc::clone(&coordinator),
            Arc::clone(&events),
            prober,
            config.paths.output_dir.clone(),
        ));

        Self {
            config: Arc::new(config),
            events,
            coordinator,
            pipeline,
        }
    }

    /// Context probing with the configured ffprobe binary.
    pub fn from_config(config: Config) -> Self {
        let prober = Arc::new(FfprobeProber::new(config.tools.ffprobe.clone()));
        Self::new(config, prober)
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes_api::api_routes())
        .nest("/output", routes_output::output_routes(&ctx))
        .merge(routes_upload::upload_routes(&ctx))
        .merge(routes_ws::ws_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Serve static files if directory is provided
    // Uses SPA fallback: serves index.html for any route that doesn't match a file
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory {:?} does not exist, not serving it", dir);
        }
    }

    app
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    crate::config::ensure_directories(&config)?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::from_config(config);
    let coordinator = Arc::clone(&ctx.coordinator);
    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let signal = shutdown_signal().await;
            match coordinator.current() {
                Some(job) => tracing::info!(
                    job_id = %job.id,
                    "{} received, cancelling job {} before shutdown",
                    signal,
                    job.name
                ),
                None => tracing::info!("{} received, no job running", signal),
            }
            // The transcoder runs in its own process group and would outlive us
            coordinator.cancel();
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM and return the name of the one that fired.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
