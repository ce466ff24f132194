//! Core types for wiki-export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Unique identifier for a wiki instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WikiId(pub i64);

impl WikiId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for WikiId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<WikiId> for i64 {
    fn from(id: WikiId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for WikiId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for WikiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WikiId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Output format of an export
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Portable Document Format
    #[default]
    Pdf,
    /// EPUB 3 e-book
    Epub,
}

impl ExportFormat {
    /// File extension used for the artifact filename
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Epub => "epub",
        }
    }

    /// MIME type of the rendered document
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Epub => "application/epub+zip",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "epub" => Ok(ExportFormat::Epub),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A wiki instance belonging to a course
///
/// Owned by the hosting platform; read-only to this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiInstance {
    /// Wiki identifier
    pub id: WikiId,
    /// Owning course
    pub course_id: i64,
    /// Course-module id (the context the wiki is exported from)
    pub cmid: i64,
    /// Display name
    pub name: String,
    /// Title of the designated entry page
    pub first_page_title: String,
    /// Format used when neither the request nor the user picks one
    pub default_format: ExportFormat,
}

/// A single page of a wiki
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    /// Page identifier
    pub id: i64,
    /// Wiki this page belongs to
    pub wiki_id: WikiId,
    /// Page title, unique within the wiki
    pub title: String,
    /// HTML content
    pub content: String,
    /// Unix timestamp of the last modification
    pub time_modified: i64,
}

/// A wiki together with the newest modification time among its pages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WikiSummary {
    /// The wiki
    pub wiki: WikiInstance,
    /// Maximum `time_modified` over all pages, `None` when the wiki has no pages
    pub last_modified: Option<i64>,
}

/// The user on whose behalf an export is generated
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// User identifier
    pub id: i64,
    /// Name shown as the author of the export
    pub display_name: String,
    /// Export format the user prefers, if any
    #[serde(default)]
    pub preferred_format: Option<ExportFormat>,
}

impl UserRef {
    /// The non-interactive user used by scheduled runs
    pub fn system() -> Self {
        Self {
            id: 0,
            display_name: "System".to_string(),
            preferred_format: None,
        }
    }
}

/// One unit of work within a scheduled run
#[derive(Clone, Debug)]
pub struct ExportJob {
    /// The wiki to export
    pub wiki: WikiInstance,
    /// Target format
    pub format: ExportFormat,
    /// Requesting user
    pub user: UserRef,
    /// When the job was created
    pub generated_at: DateTime<Utc>,
}

/// A rendered export document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Suggested filename, e.g. `Export_Example_wiki_2026-10-18.pdf`
    pub filename: String,
    /// Format of `bytes`
    pub format: ExportFormat,
    /// The opaque document
    pub bytes: Vec<u8>,
    /// Number of pages included
    pub page_count: usize,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl ExportArtifact {
    /// MIME type of the artifact
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Persisted scheduler state
///
/// `last_cron` only ever advances; see [`RunStateStore`](crate::store::RunStateStore).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Unix timestamp of the last completed run
    pub last_cron: i64,
    /// Recipient of scheduled exports; empty or missing disables them
    pub publish_email: Option<String>,
}

impl RunState {
    /// The configured recipient, ignoring blank values
    pub fn recipient(&self) -> Option<&str> {
        self.publish_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The configured recipient, or [`Error::NotConfigured`] when there is none
    pub fn require_recipient(&self) -> Result<&str, Error> {
        self.recipient().ok_or(Error::NotConfigured)
    }
}

/// Events emitted by the export scheduler
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportEvent {
    /// A run started scanning for changes
    RunStarted {
        /// Timestamp the run will commit as `last_cron`
        started_at: i64,
    },
    /// A wiki was exported and the notification sent
    WikiExported {
        /// The wiki
        wiki_id: WikiId,
        /// Filename of the attachment
        filename: String,
    },
    /// A wiki was skipped because its export or notification failed
    WikiSkipped {
        /// The wiki
        wiki_id: WikiId,
        /// Why it was skipped
        error: String,
    },
    /// A run finished
    RunCompleted {
        /// Number of wikis exported
        exported: usize,
        /// Number of wikis skipped
        skipped: usize,
        /// Whether `last_cron` was advanced
        committed: bool,
    },
}
