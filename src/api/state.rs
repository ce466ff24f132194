//! Application state for the API server

use crate::scheduler_task::ExportScheduler;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request; the scheduler gives access to configuration, wiki
/// storage and the renderer.
#[derive(Clone)]
pub struct AppState {
    /// The export scheduler
    pub scheduler: Arc<ExportScheduler>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(scheduler: Arc<ExportScheduler>) -> Self {
        Self { scheduler }
    }
}
