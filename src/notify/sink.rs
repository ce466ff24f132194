//! In-memory mail sink

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::{EmailMessage, Notifier};
use crate::{Error, Result};

/// Notifier that keeps every message in memory
///
/// Useful when the embedding application delivers mail itself, and for
/// tests. Sends can be made to fail with [`MemoryMailSink::fail_subjects_containing`].
#[derive(Debug, Default)]
pub struct MemoryMailSink {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryMailSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub fn messages(&self) -> Vec<EmailMessage> {
        lock(&self.sent).clone()
    }

    /// Number of messages sent so far
    pub fn len(&self) -> usize {
        lock(&self.sent).len()
    }

    /// Whether no message has been sent
    pub fn is_empty(&self) -> bool {
        lock(&self.sent).is_empty()
    }

    /// Remove and return all messages
    pub fn take(&self) -> Vec<EmailMessage> {
        std::mem::take(&mut *lock(&self.sent))
    }

    /// Reject messages whose subject contains `fragment`
    pub fn fail_subjects_containing(&self, fragment: impl Into<String>) {
        lock(&self.failing).push(fragment.into());
    }
}

#[async_trait]
impl Notifier for MemoryMailSink {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if lock(&self.failing)
            .iter()
            .any(|f| message.subject.contains(f.as_str()))
        {
            return Err(Error::Notify(format!(
                "delivery to {} rejected",
                message.to
            )));
        }
        lock(&self.sent).push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str) -> EmailMessage {
        EmailMessage {
            from: "a@localhost".into(),
            to: "b@localhost".into(),
            subject: subject.into(),
            content_type: "text/plain".into(),
            body: String::new(),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_records_and_fails() {
        let sink = MemoryMailSink::new();
        sink.fail_subjects_containing("Broken");

        sink.send(&message("Wiki 'Fine' updated")).await.unwrap();
        let err = sink.send(&message("Wiki 'Broken' updated")).await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take()[0].subject, "Wiki 'Fine' updated");
        assert!(sink.is_empty());
    }
}
