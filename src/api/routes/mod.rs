//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`export`] : Export on demand, scheduled run trigger
//! - [`system`] : Health

use serde::Deserialize;

mod export;
mod system;

pub use export::*;
pub use system::*;

/// Query parameters for `GET /wikis/:id/export`
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// `pdf` or `epub`; empty or missing uses the user's or the wiki's default
    #[serde(default)]
    pub format: Option<String>,
    /// Requesting user id
    #[serde(default)]
    pub user: Option<i64>,
    /// Name shown as the author of the export
    #[serde(default)]
    pub author: Option<String>,
    /// Course-module context; defaults to the wiki's own
    #[serde(default)]
    pub context: Option<i64>,
    /// Comma-separated page titles to restrict the export to
    #[serde(default)]
    pub pages: Option<String>,
}

impl ExportQuery {
    /// Selected page titles, if any
    pub fn selection(&self) -> Option<Vec<String>> {
        self.pages.as_ref().map(|pages| {
            pages
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
