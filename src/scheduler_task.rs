//! Scheduled export of changed wikis
//!
//! A run moves through `Idle → Scanning → Exporting(wiki) → Notifying(wiki) → Idle`:
//!
//! - **Scanning**: load the persisted [`RunState`](crate::types::RunState). Without a
//!   recipient the run ends immediately with no side effects. Otherwise the
//!   [`ChangeTracker`] lists wikis edited since `last_cron`.
//! - **Exporting**: each changed wiki is exported with the scheduled format on
//!   behalf of the system user.
//! - **Notifying**: the artifact is mailed to the recipient.
//! - Once every wiki is done, `last_cron` is set to one second before the
//!   run's start time (see [`ChangeTracker::watermark`]).
//!
//! Failures of a single wiki are logged, reported and skipped; they never
//! abort the run. Only failures to read or write the run state are returned
//! to the caller.
//!
//! # Example
//!
//! ```no_run
//! use wiki_export::config::Config;
//! use wiki_export::scheduler_task::ExportScheduler;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = ExportScheduler::from_config(Config::default()).await?;
//! let shutdown = CancellationToken::new();
//!
//! // Runs once per configured interval until cancelled
//! scheduler.run(shutdown.clone()).await;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::change_tracker::ChangeTracker;
use crate::config::{Config, LastCronPolicy};
use crate::db::Database;
use crate::export::{DefaultRenderer, DocumentRenderer, ExportBuilder};
use crate::notify::{Notifier, compose_update_email, notifier_from_config};
use crate::store::{RunStateStore, WikiStore};
use crate::types::{ExportEvent, ExportJob, UserRef, WikiId, WikiInstance};
use crate::{Error, Result};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Current activity of the scheduler
///
/// While several wikis are processed concurrently this reflects the most
/// recent transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "wiki_id", rename_all = "snake_case")]
pub enum RunPhase {
    /// No run in progress
    Idle,
    /// Reading run state and looking for changed wikis
    Scanning,
    /// Building the export of a wiki
    Exporting(WikiId),
    /// Sending the export of a wiki
    Notifying(WikiId),
}

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every changed wiki was processed
    Completed,
    /// No recipient is configured; nothing was done
    NotConfigured,
    /// Another run held the run lock; nothing was done
    AlreadyRunning,
}

/// Stage at which a wiki was skipped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Building the export failed
    Export,
    /// Sending the notification failed
    Notify,
}

/// Result for one changed wiki
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WikiOutcome {
    /// Exported and mailed
    Exported {
        /// The wiki
        wiki_id: WikiId,
        /// Attachment filename
        filename: String,
        /// Number of pages in the export
        page_count: usize,
    },
    /// Skipped after a failure
    Skipped {
        /// The wiki
        wiki_id: WikiId,
        /// Where it failed
        stage: FailureStage,
        /// Error message
        error: String,
    },
}

impl WikiOutcome {
    /// The wiki this outcome belongs to
    pub fn wiki_id(&self) -> WikiId {
        match self {
            WikiOutcome::Exported { wiki_id, .. } | WikiOutcome::Skipped { wiki_id, .. } => {
                *wiki_id
            }
        }
    }

    /// Whether the wiki was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, WikiOutcome::Skipped { .. })
    }
}

/// Summary of one run
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Run start (unix seconds); `last_cron` is committed one second earlier
    pub started_at: i64,
    /// Per-wiki results, ascending by wiki id
    pub wikis: Vec<WikiOutcome>,
    /// Whether `last_cron` was advanced
    pub committed: bool,
}

impl RunReport {
    fn empty(outcome: RunOutcome, started_at: i64) -> Self {
        Self {
            outcome,
            started_at,
            wikis: Vec::new(),
            committed: false,
        }
    }

    /// Number of wikis exported and mailed
    pub fn exported(&self) -> usize {
        self.wikis.iter().filter(|w| !w.is_skipped()).count()
    }

    /// Number of wikis skipped
    pub fn skipped(&self) -> usize {
        self.wikis.iter().filter(|w| w.is_skipped()).count()
    }
}

/// Orchestrates scheduled exports
pub struct ExportScheduler {
    config: Arc<Config>,
    wikis: Arc<dyn WikiStore>,
    state: Arc<dyn RunStateStore>,
    renderer: Arc<dyn DocumentRenderer>,
    notifier: Arc<dyn Notifier>,
    run_lock: Mutex<()>,
    phase: std::sync::Mutex<RunPhase>,
    event_tx: broadcast::Sender<ExportEvent>,
}

impl ExportScheduler {
    /// Create a scheduler from its collaborators
    pub fn new(
        config: Config,
        wikis: Arc<dyn WikiStore>,
        state: Arc<dyn RunStateStore>,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            wikis,
            state,
            renderer,
            notifier,
            run_lock: Mutex::new(()),
            phase: std::sync::Mutex::new(RunPhase::Idle),
            event_tx,
        }
    }

    /// Create a scheduler backed by the configured database, renderer and
    /// notifier
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the database cannot be opened.
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        db.seed_run_state(Utc::now().timestamp()).await?;

        let renderer = Arc::new(DefaultRenderer::from_config(&config.export));
        let notifier = notifier_from_config(&config.notifications)?;

        Ok(Self::new(config, db.clone(), db, renderer, notifier))
    }

    /// Scheduler configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wiki storage
    pub fn wikis(&self) -> &Arc<dyn WikiStore> {
        &self.wikis
    }

    /// Document renderer
    pub fn renderer(&self) -> &Arc<dyn DocumentRenderer> {
        &self.renderer
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.event_tx.subscribe()
    }

    /// Current phase
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) = phase;
    }

    fn emit(&self, event: ExportEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Run once
    ///
    /// Per-wiki failures are contained in the report. A run started while
    /// another is in progress returns immediately with
    /// [`RunOutcome::AlreadyRunning`].
    ///
    /// # Errors
    ///
    /// Only when the run state or the wiki list cannot be read, or `last_cron`
    /// cannot be committed.
    pub async fn execute(&self) -> Result<RunReport> {
        let started_at = Utc::now();

        let Ok(_guard) = self.run_lock.try_lock() else {
            info!("Export run already in progress, skipping");
            return Ok(RunReport::empty(
                RunOutcome::AlreadyRunning,
                started_at.timestamp(),
            ));
        };

        let result = self.execute_locked(started_at).await;
        self.set_phase(RunPhase::Idle);

        if let Err(e) = &result {
            error!(error = %e, "Export run failed");
        }
        result
    }

    async fn execute_locked(&self, started_at: DateTime<Utc>) -> Result<RunReport> {
        let start_ts = started_at.timestamp();
        self.set_phase(RunPhase::Scanning);

        let state = self.state.load_run_state().await?;
        let recipient = match state.require_recipient() {
            Ok(recipient) => recipient.to_string(),
            Err(e) => {
                info!(reason = %e, "Skipping scheduled export");
                return Ok(RunReport::empty(RunOutcome::NotConfigured, start_ts));
            }
        };

        self.emit(ExportEvent::RunStarted {
            started_at: start_ts,
        });

        let summaries = self.wikis.wiki_summaries().await?;
        let changed = ChangeTracker::changed_wikis(state.last_cron, &summaries);
        info!(
            last_cron = state.last_cron,
            total = summaries.len(),
            changed = changed.len(),
            "Scanned wikis for changes"
        );

        let concurrency = self.config.schedule.max_concurrent_exports.max(1);
        let mut outcomes: Vec<WikiOutcome> = futures::stream::iter(changed)
            .map(|wiki| self.process_wiki(wiki, &recipient, started_at))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(WikiOutcome::wiki_id);

        let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
        let commit = match self.config.schedule.last_cron_policy {
            LastCronPolicy::AdvanceAlways => true,
            LastCronPolicy::HoldOnFailure => skipped == 0,
        };

        if commit {
            self.state
                .commit_last_cron(ChangeTracker::watermark(start_ts))
                .await?;
        } else {
            warn!(
                skipped,
                last_cron = state.last_cron,
                "Keeping last_cron so failed wikis are retried next run"
            );
        }

        let report = RunReport {
            outcome: RunOutcome::Completed,
            started_at: start_ts,
            wikis: outcomes,
            committed: commit,
        };

        self.emit(ExportEvent::RunCompleted {
            exported: report.exported(),
            skipped,
            committed: commit,
        });
        info!(
            exported = report.exported(),
            skipped,
            committed = commit,
            "Export run complete"
        );

        Ok(report)
    }

    async fn process_wiki(
        &self,
        wiki: WikiInstance,
        recipient: &str,
        generated_at: DateTime<Utc>,
    ) -> WikiOutcome {
        let wiki_id = wiki.id;
        let job = ExportJob {
            format: self.config.export.scheduled_format,
            user: UserRef::system(),
            generated_at,
            wiki,
        };

        self.set_phase(RunPhase::Exporting(wiki_id));
        let artifact = match self.export(&job).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(wiki_id = %wiki_id, error = %e, "Export failed, skipping wiki");
                return self.skipped(wiki_id, FailureStage::Export, e);
            }
        };

        self.set_phase(RunPhase::Notifying(wiki_id));
        let message = compose_update_email(
            &self.config.notifications.from_address,
            recipient,
            &job.wiki,
            &artifact,
        );
        let timeout = self.config.notifications.send_timeout;
        let sent = match tokio::time::timeout(timeout, self.notifier.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Notify(format!("send timed out after {:?}", timeout))),
        };
        if let Err(e) = sent {
            warn!(
                wiki_id = %wiki_id,
                notifier = self.notifier.name(),
                error = %e,
                "Notification failed, skipping wiki"
            );
            return self.skipped(wiki_id, FailureStage::Notify, e);
        }

        info!(wiki_id = %wiki_id, filename = %artifact.filename, to = %recipient, "Export sent");
        self.emit(ExportEvent::WikiExported {
            wiki_id,
            filename: artifact.filename.clone(),
        });
        WikiOutcome::Exported {
            wiki_id,
            filename: artifact.filename,
            page_count: artifact.page_count,
        }
    }

    async fn export(&self, job: &ExportJob) -> Result<crate::types::ExportArtifact> {
        ExportBuilder::new(
            job.wiki.cmid,
            job.wiki.clone(),
            job.format.extension(),
            job.user.clone(),
            None,
        )?
        .with_config(&self.config.export)
        .generated_at(job.generated_at)
        .build(self.wikis.as_ref(), self.renderer.as_ref())
        .await
    }

    fn skipped(&self, wiki_id: WikiId, stage: FailureStage, error: Error) -> WikiOutcome {
        let error = error.to_string();
        self.emit(ExportEvent::WikiSkipped {
            wiki_id,
            error: error.clone(),
        });
        WikiOutcome::Skipped {
            wiki_id,
            stage,
            error,
        }
    }

    /// Run [`execute`](Self::execute) every `schedule.interval` until
    /// `shutdown` is cancelled
    ///
    /// The first run starts immediately. Cancellation is only observed
    /// between runs; a run in progress is allowed to finish.
    pub async fn run(&self, shutdown: CancellationToken) {
        let interval = self.config.schedule.interval;
        info!(interval_secs = interval.as_secs(), "Export scheduler started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Ok(report) = self.execute().await {
                        debug!(
                            outcome = ?report.outcome,
                            exported = report.exported(),
                            skipped = report.skipped(),
                            "Scheduled run finished"
                        );
                    }
                }
            }
        }

        info!("Export scheduler stopped");
    }
}
