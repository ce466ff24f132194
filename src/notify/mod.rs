//! Email notification of updated exports
//!
//! The [`Notifier`] trait is the mail transport seam. Two implementations ship
//! with the crate:
//! - [`MailRelayNotifier`] POSTs messages as JSON to an HTTP mail relay
//! - [`MemoryMailSink`] keeps messages in memory
//!
//! [`compose_update_email`] builds the message sent for each changed wiki.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::Result;
use crate::config::NotificationConfig;
use crate::types::{ExportArtifact, WikiInstance};

mod relay;
mod sink;

pub use relay::MailRelayNotifier;
pub use sink::MemoryMailSink;

/// Marker line at the start of every update email body
pub const UPDATE_BODY_MARKER: &str = "Updated export attached";

/// Line length of base64 blocks in MIME bodies
const BASE64_LINE_LEN: usize = 76;

/// A file attached to an email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Filename shown to the recipient
    pub filename: String,
    /// MIME type
    pub content_type: String,
    /// File contents, serialized as base64
    #[serde(serialize_with = "serialize_base64")]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Contents encoded as base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

fn serialize_base64<S: Serializer>(
    data: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

/// An outgoing email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// MIME type of `body`
    pub content_type: String,
    /// Message body
    pub body: String,
    /// Optional attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Trait for mail transports
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    ///
    /// # Errors
    ///
    /// Returns `Error::Notify` (or `Error::Network`) when delivery fails.
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Compose the notification for an updated wiki
///
/// The subject is `Wiki '<name>' updated`. The body is a `multipart/mixed`
/// MIME document: a short text part followed by the artifact as a base64
/// attachment part. The artifact is also carried in `attachment`.
pub fn compose_update_email(
    from: &str,
    to: &str,
    wiki: &WikiInstance,
    artifact: &ExportArtifact,
) -> EmailMessage {
    let boundary = format!("wiki-export-{:016x}", rand::random::<u64>());
    let attachment = Attachment {
        filename: artifact.filename.clone(),
        content_type: artifact.content_type().to_string(),
        data: artifact.bytes.clone(),
    };

    let mut body = String::new();
    body.push_str(&format!("--{}\r\n", boundary));
    body.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    body.push_str(&format!(
        "{}: {} ({} pages, generated {}).\r\n\r\n",
        UPDATE_BODY_MARKER,
        wiki.name,
        artifact.page_count,
        artifact.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    body.push_str(&format!("--{}\r\n", boundary));
    body.push_str(&format!(
        "Content-Type: {}; name=\"{}\"\r\n",
        attachment.content_type, attachment.filename
    ));
    body.push_str("Content-Transfer-Encoding: base64\r\n");
    body.push_str(&format!(
        "Content-Disposition: attachment; filename={}\r\n\r\n",
        attachment.filename
    ));
    let encoded = attachment.to_base64();
    for line in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        body.push_str(&String::from_utf8_lossy(line));
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", boundary));

    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Wiki '{}' updated", wiki.name),
        content_type: format!("multipart/mixed; boundary=\"{}\"", boundary),
        body,
        attachment: Some(attachment),
    }
}

/// Build the notifier described by `config`
///
/// Without a relay, messages are kept in a [`MemoryMailSink`].
pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    match &config.relay {
        Some(relay) => Ok(Arc::new(MailRelayNotifier::new(relay.clone(), config)?)),
        None => {
            tracing::info!("No mail relay configured, notifications are kept in memory");
            Ok(Arc::new(MemoryMailSink::new()))
        }
    }
}
