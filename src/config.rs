//! Configuration types for wiki-export
//!
//! The recipient address and last-run timestamp are not part of this
//! configuration: they live in the persisted [`RunState`](crate::types::RunState)
//! so the hosting platform can manage them.

use crate::types::ExportFormat;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Export behaviour (formats, rendering, caching)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Format used by scheduled exports (default: pdf)
    #[serde(default)]
    pub scheduled_format: ExportFormat,

    /// Upper bound for a single render call (default: 120 seconds)
    #[serde(default = "default_render_timeout", with = "duration_serde")]
    pub render_timeout: Duration,

    /// Append pages not reachable from the entry page, ordered by title (default: false)
    #[serde(default)]
    pub include_orphans: bool,

    /// Directory for cached artifacts (None = no caching)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// HTML-to-PDF converter executable (auto-detected if None)
    #[serde(default)]
    pub pdf_command: Option<PathBuf>,

    /// Extra arguments passed to the PDF converter before the input/output paths
    #[serde(default = "default_pdf_args")]
    pub pdf_args: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scheduled_format: ExportFormat::Pdf,
            render_timeout: default_render_timeout(),
            include_orphans: false,
            cache_dir: None,
            pdf_command: None,
            pdf_args: default_pdf_args(),
        }
    }
}

/// What to do with `last_cron` when some wikis in a run failed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastCronPolicy {
    /// Advance `last_cron` after every completed run; failed wikis wait for
    /// their next edit
    #[default]
    AdvanceAlways,
    /// Keep `last_cron` when any wiki failed so the next run retries the
    /// whole changed set
    HoldOnFailure,
}

/// Scheduled run behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Time between runs of the periodic loop (default: 1 hour)
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Maximum wikis exported concurrently within a run (default: 2)
    #[serde(default = "default_max_concurrent_exports")]
    pub max_concurrent_exports: usize,

    /// `last_cron` handling on partial failure
    #[serde(default)]
    pub last_cron_policy: LastCronPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            max_concurrent_exports: default_max_concurrent_exports(),
            last_cron_policy: LastCronPolicy::default(),
        }
    }
}

/// HTTP mail relay endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailRelayConfig {
    /// URL the message JSON is POSTed to
    pub url: String,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,
}

/// Notification delivery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Sender address (default: "noreply@localhost")
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Mail relay (None = messages are only recorded in memory)
    #[serde(default)]
    pub relay: Option<MailRelayConfig>,

    /// Upper bound for delivering one message (default: 30 seconds)
    #[serde(default = "default_send_timeout", with = "duration_serde")]
    pub send_timeout: Duration,

    /// Retry behaviour for transient relay failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from_address: default_from_address(),
            relay: None,
            send_timeout: default_send_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Data storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./wiki-export.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export behaviour
    #[serde(default)]
    pub export: ExportConfig,

    /// Scheduled run behaviour
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Notification delivery
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API server
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check values that serde cannot validate
    pub fn validate(&self) -> crate::Result<()> {
        if self.schedule.max_concurrent_exports == 0 {
            return Err(crate::Error::Config {
                message: "max_concurrent_exports must be at least 1".into(),
                key: Some("max_concurrent_exports".into()),
            });
        }
        if self.export.render_timeout.is_zero() {
            return Err(crate::Error::Config {
                message: "render_timeout must be greater than zero".into(),
                key: Some("render_timeout".into()),
            });
        }
        if let Some(relay) = &self.notifications.relay
            && !(relay.url.starts_with("http://") || relay.url.starts_with("https://"))
        {
            return Err(crate::Error::Config {
                message: format!("mail relay url must be http(s): {}", relay.url),
                key: Some("relay.url".into()),
            });
        }
        Ok(())
    }
}

fn default_render_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_pdf_args() -> Vec<String> {
    vec!["--quiet".into(), "--encoding".into(), "utf-8".into()]
}

fn default_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_max_concurrent_exports() -> usize {
    2
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./wiki-export.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
