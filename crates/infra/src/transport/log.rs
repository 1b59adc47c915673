use async_trait::async_trait;
use tracing::info;

use super::{MessageTransport, OutboundMessage, TransportError};

/// Logs each message and reports success. Development default when no relay is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MessageTransport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body_len = message.body.len(),
            "outbound message"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
