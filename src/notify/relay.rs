//! HTTP mail relay transport

use async_trait::async_trait;
use std::time::Duration;

use super::{EmailMessage, Notifier};
use crate::config::{MailRelayConfig, NotificationConfig, RetryConfig};
use crate::retry::with_retry;
use crate::{Error, Result};

/// Notifier that POSTs each message as JSON to an HTTP mail relay
///
/// Transient failures (timeouts, connection errors, 429 and 5xx responses)
/// are retried with exponential backoff.
pub struct MailRelayNotifier {
    client: reqwest::Client,
    relay: MailRelayConfig,
    retry: RetryConfig,
    timeout: Duration,
}

impl MailRelayNotifier {
    /// Create a notifier for `relay`, taking timeout and retry settings from `config`
    pub fn new(relay: MailRelayConfig, config: &NotificationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .build()?;

        Ok(Self {
            client,
            relay,
            retry: config.retry.clone(),
            timeout: config.send_timeout,
        })
    }

    async fn post(&self, message: &EmailMessage) -> Result<()> {
        let mut request = self.client.post(&self.relay.url).json(message);
        if let Some(auth) = &self.relay.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(Error::Network(e)),
            Err(_) => {
                return Err(Error::Notify(format!(
                    "relay request timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Notify(format!(
                "relay returned status {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        with_retry(&self.retry, || self.post(message)).await?;
        tracing::debug!(
            url = %self.relay.url,
            to = %message.to,
            subject = %message.subject,
            "Message delivered to mail relay"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mail-relay"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Attachment;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            from: "noreply@localhost".into(),
            to: "wiki@example.com".into(),
            subject: "Wiki 'Example wiki' updated".into(),
            content_type: "text/plain".into(),
            body: "Updated export attached".into(),
            attachment: Some(Attachment {
                filename: "Export_Example_wiki_2025-10-18.pdf".into(),
                content_type: "application/pdf".into(),
                data: b"%PDF".to_vec(),
            }),
        }
    }

    fn notifier(server: &MockServer, auth: Option<&str>) -> MailRelayNotifier {
        let config = NotificationConfig {
            send_timeout: Duration::from_secs(5),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..Default::default()
        };
        let relay = MailRelayConfig {
            url: format!("{}/send", server.uri()),
            auth_header: auth.map(str::to_string),
        };
        MailRelayNotifier::new(relay, &config).unwrap()
    }

    #[tokio::test]
    async fn test_posts_message_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server, Some("Bearer secret"))
            .send(&message())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["to"], "wiki@example.com");
        assert_eq!(body["subject"], "Wiki 'Example wiki' updated");
        assert_eq!(body["attachment"]["data"], "JVBERg==");
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        notifier(&server, None).send(&message()).await.unwrap();
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad address"))
            .expect(1)
            .mount(&server)
            .await;

        let err = notifier(&server, None).send(&message()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Notify(msg) if msg.contains("422") && msg.contains("bad address")
        ));
    }
}
