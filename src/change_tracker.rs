//! Detection of wikis edited since the last scheduled run

use crate::types::{WikiInstance, WikiSummary};

/// Decides which wikis need a fresh export
///
/// Precondition: `last_cron` has been meaningfully initialised. With a
/// `last_cron` of 0 every wiki with at least one page counts as changed; use
/// [`Database::seed_run_state`](crate::db::Database::seed_run_state) on
/// install to avoid exporting everything on the first run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeTracker;

impl ChangeTracker {
    /// Wikis whose newest page modification is strictly after `last_cron`
    ///
    /// Wikis without pages never appear. The result is ascending by wiki id.
    pub fn changed_wikis(last_cron: i64, summaries: &[WikiSummary]) -> Vec<WikiInstance> {
        let mut changed: Vec<WikiInstance> = summaries
            .iter()
            .filter(|s| s.last_modified.is_some_and(|modified| modified > last_cron))
            .map(|s| s.wiki.clone())
            .collect();
        changed.sort_by_key(|w| w.id);
        changed
    }

    /// The `last_cron` to persist for a run that started at `started_at`
    ///
    /// Modification times have one-second resolution, so an edit saved in
    /// the run's start second after the scan carries `time_modified ==
    /// started_at`. The watermark stays one second behind the start so such
    /// an edit is still strictly newer on the next run. Wikis already
    /// exported from that second may be mailed a second time.
    pub fn watermark(started_at: i64) -> i64 {
        started_at.saturating_sub(1)
    }
}
