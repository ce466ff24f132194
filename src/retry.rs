//! Retry logic with exponential backoff
//!
//! Used by the mail relay notifier for transient delivery failures. Delays
//! grow exponentially up to `max_delay`, with optional jitter.
//!
//! # Example
//!
//! ```no_run
//! use wiki_export::retry::{IsRetryable, with_retry};
//! use wiki_export::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum RelayError {
//!     Busy,
//!     Rejected,
//! }
//!
//! impl std::fmt::Display for RelayError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for RelayError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, RelayError::Busy)
//!     }
//! }
//!
//! # async fn example() -> Result<(), RelayError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, RelayError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, relay overload) return
/// `true`; everything else is permanent.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // The relay reports its own failures as text
            Error::Notify(msg) => {
                msg.contains("timed out")
                    || msg.contains("temporar")
                    || msg.contains("status 429")
                    || msg.contains("status 5")
            }
            Error::Render(_) => false,
            Error::Database(_) | Error::Sqlx(_) => false,
            Error::Config { .. } => false,
            Error::NotConfigured => false,
            Error::NotFound(_) => false,
            Error::UnsupportedFormat(_) => false,
            Error::Serialization(_) => false,
            Error::ApiServerError(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `operation` is called once, then up to `config.max_attempts` more times
/// while it fails with a retryable error.
///
/// # Returns
///
/// The successful result, or the last error once retries are exhausted or a
/// permanent error occurs.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Jitter is uniform between 0% and 100% of `delay`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
