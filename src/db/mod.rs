//! Database layer for wiki-export
//!
//! Handles SQLite persistence for wikis, pages and the scheduler's run state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] : Database lifecycle, schema migrations
//! - [`wikis`] : Wiki instance and page storage
//! - [`state`] : Run state (`lastcron`, `publishemail`)

use crate::types::{ExportFormat, WikiId, WikiInstance, WikiPage};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod state;
mod wikis;

/// New wiki instance to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewWiki {
    /// Owning course
    pub course_id: i64,
    /// Course-module id
    pub cmid: i64,
    /// Display name
    pub name: String,
    /// Title of the entry page
    pub first_page_title: String,
    /// Default export format
    pub default_format: ExportFormat,
}

/// New page to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewPage {
    /// Wiki the page belongs to
    pub wiki_id: WikiId,
    /// Page title, unique within the wiki
    pub title: String,
    /// HTML content
    pub content: String,
    /// Unix timestamp of the last modification
    pub time_modified: i64,
}

/// Wiki record from database
#[derive(Debug, Clone, FromRow)]
pub(crate) struct WikiRow {
    pub id: i64,
    pub course_id: i64,
    pub cmid: i64,
    pub name: String,
    pub first_page_title: String,
    pub default_format: String,
}

impl From<WikiRow> for WikiInstance {
    fn from(row: WikiRow) -> Self {
        WikiInstance {
            id: WikiId(row.id),
            course_id: row.course_id,
            cmid: row.cmid,
            name: row.name,
            first_page_title: row.first_page_title,
            default_format: row.default_format.parse().unwrap_or_default(),
        }
    }
}

/// Page record from database
#[derive(Debug, Clone, FromRow)]
pub(crate) struct PageRow {
    pub id: i64,
    pub wiki_id: i64,
    pub title: String,
    pub content: String,
    pub time_modified: i64,
}

impl From<PageRow> for WikiPage {
    fn from(row: PageRow) -> Self {
        WikiPage {
            id: row.id,
            wiki_id: WikiId(row.wiki_id),
            title: row.title,
            content: row.content,
            time_modified: row.time_modified,
        }
    }
}

/// Database handle for wiki-export
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
