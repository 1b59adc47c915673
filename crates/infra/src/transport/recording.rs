use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{MessageTransport, OutboundMessage, TransportError};

#[derive(Debug, Default)]
struct Inner {
    sent: Vec<OutboundMessage>,
    failing: HashSet<String>,
}

/// Records every delivered message in memory.
///
/// Recipients registered with [`fail_recipient`](Self::fail_recipient) get
/// `TransportError::Unavailable` until recovered; failed sends are not recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    inner: Mutex<Inner>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_recipient(&self, to: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.insert(to.into());
        }
    }

    pub fn recover_recipient(&self, to: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.remove(to);
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.inner
            .lock()
            .map(|inner| inner.sent.clone())
            .unwrap_or_default()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutboundMessage> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| TransportError::Unavailable("recorder lock poisoned".to_string()))?;
        if inner.failing.contains(&message.to) {
            return Err(TransportError::Unavailable(format!("{} unreachable", message.to)));
        }
        inner.sent.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Transient;

    fn message(to: &str) -> OutboundMessage {
        OutboundMessage::new("ops@company.com", to, "subject", "body")
    }

    #[tokio::test]
    async fn failing_recipient_is_isolated() {
        let transport = RecordingTransport::new();
        transport.fail_recipient("finance@company.com");

        assert!(transport.send(&message("vendor@example.com")).await.is_ok());
        let err = transport.send(&message("finance@company.com")).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.sent().len(), 1);

        transport.recover_recipient("finance@company.com");
        transport.send(&message("finance@company.com")).await.unwrap();
        assert_eq!(transport.sent_to("finance@company.com").len(), 1);
    }
}
