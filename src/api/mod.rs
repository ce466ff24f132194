//! REST API server module
//!
//! Exposes export-on-demand over HTTP, a trigger for a scheduled run, and a
//! health check.

use crate::Result;
use crate::scheduler_task::ExportScheduler;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Export
/// - `GET /wikis/:id/export` - Export a wiki (`format`, `user`, `author`,
///   `context`, `pages` query parameters)
/// - `POST /export/run` - Run a scheduled export now
/// - `GET /export/status` - Current scheduler phase
///
/// ## System
/// - `GET /health` - Health check
pub fn create_router(scheduler: Arc<ExportScheduler>) -> Router {
    let state = AppState::new(scheduler);

    Router::new()
        .route("/wikis/:id/export", get(routes::export_wiki))
        .route("/export/run", post(routes::run_export))
        .route("/export/status", get(routes::export_status))
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the API server on the configured bind address
///
/// Serves until `shutdown` is cancelled, then finishes in-flight requests.
///
/// # Example
///
/// ```no_run
/// use wiki_export::config::Config;
/// use wiki_export::scheduler_task::ExportScheduler;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = Arc::new(ExportScheduler::from_config(Config::default()).await?);
/// let shutdown = CancellationToken::new();
///
/// wiki_export::api::start_api_server(scheduler, shutdown).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    scheduler: Arc<ExportScheduler>,
    shutdown: CancellationToken,
) -> Result<()> {
    let bind_address = scheduler.config().api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(scheduler);
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
