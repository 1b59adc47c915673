use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{MessageTransport, OutboundMessage, TransportError};

/// Posts `{from, to, subject, body}` as JSON to a mail relay.
///
/// 4xx responses are rejections; 5xx and connection failures are unavailability.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpRelayTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MessageTransport for HttpRelayTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let reason = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                to: message.to.clone(),
                reason: format!("HTTP {status}: {reason}"),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Unavailable(format!("relay returned HTTP {status}")));
        }
        debug!(to = %message.to, subject = %message.subject, "relayed message");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http_relay"
    }
}
