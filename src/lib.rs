//! # wiki-export
//!
//! Export course wikis as PDF or EPUB documents, on demand or on a schedule.
//!
//! A wiki is a set of HTML pages cross-linked with `[[Title]]` markers. An
//! export walks the link graph from the entry page, rewrites cross-page links
//! into in-document anchors and hands the assembled pages to a
//! [`DocumentRenderer`](export::DocumentRenderer). The scheduled task exports
//! every wiki changed since the previous run and mails the result to the
//! configured recipient.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wiki_export::{Config, ExportScheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Arc::new(ExportScheduler::from_config(Config::default()).await?);
//!
//!     // Subscribe to events
//!     let mut events = scheduler.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = scheduler.execute().await?;
//!     println!("exported {} wikis", report.exported());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// REST API module
pub mod api;
/// Change detection between scheduled runs
pub mod change_tracker;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Page ordering, rendering and export assembly
pub mod export;
/// Wiki link discovery and rewriting
pub mod links;
/// HTML line-break normalization
pub mod normalize;
/// Email composition and delivery
pub mod notify;
/// Retry logic with exponential backoff
pub mod retry;
/// Scheduled export task
pub mod scheduler_task;
/// Storage traits
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, LastCronPolicy};
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, RenderError, Result, ToHttpStatus,
};
pub use export::{DocumentRenderer, ExportBuilder};
pub use normalize::normalize_line_breaks;
pub use notify::{EmailMessage, Notifier};
pub use scheduler_task::{ExportScheduler, RunOutcome, RunReport};
pub use store::{RunStateStore, WikiStore};
pub use types::{
    ExportArtifact, ExportEvent, ExportFormat, RunState, UserRef, WikiId, WikiInstance, WikiPage,
};

/// Run the scheduler loop and the API server until a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// In-flight runs finish before the scheduler loop returns.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wiki_export::{Config, ExportScheduler, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scheduler = ExportScheduler::from_config(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(Arc::new(scheduler)).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(scheduler: Arc<ExportScheduler>) -> Result<()> {
    let shutdown = CancellationToken::new();

    let api = tokio::spawn(api::start_api_server(scheduler.clone(), shutdown.clone()));
    let runner = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    wait_for_signal().await;
    shutdown.cancel();

    if let Err(e) = runner.await {
        tracing::error!(error = %e, "Scheduler task panicked");
    }
    match api.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "API server task panicked");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
