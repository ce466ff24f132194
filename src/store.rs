//! Narrow interfaces to the hosting platform's storage
//!
//! Wiki content and the scheduler's persisted state are owned outside this
//! crate. [`Database`](crate::db::Database) implements both traits on SQLite;
//! embedders can implement them over their own storage.

use async_trait::async_trait;

use crate::Result;
use crate::types::{RunState, WikiId, WikiInstance, WikiPage, WikiSummary};

/// Read-only access to wikis and their pages
#[async_trait]
pub trait WikiStore: Send + Sync {
    /// Look up a wiki by id
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when no wiki has this id.
    async fn wiki(&self, id: WikiId) -> Result<WikiInstance>;

    /// All pages of a wiki, in no particular order
    async fn pages(&self, id: WikiId) -> Result<Vec<WikiPage>>;

    /// Every wiki with the newest modification time among its pages
    async fn wiki_summaries(&self) -> Result<Vec<WikiSummary>>;
}

/// Persisted scheduler state (`lastcron`, `publishemail`)
#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Load the current state
    ///
    /// A missing `lastcron` reads as 0 and a missing `publishemail` as `None`.
    async fn load_run_state(&self) -> Result<RunState>;

    /// Record a completed run
    ///
    /// Implementations must never move `last_cron` backwards: committing a
    /// timestamp older than the stored one leaves the stored value in place.
    async fn commit_last_cron(&self, timestamp: i64) -> Result<()>;
}
