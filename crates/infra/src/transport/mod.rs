//! Outbound message delivery (RFQs, approval requests, PO documents, handoffs).

pub mod http_relay;
pub mod log;
pub mod recording;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Transient;

pub use http_relay::HttpRelayTransport;
pub use log::LogTransport;
pub use recording::RecordingTransport;

/// One message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The relay refused the message; sending it again will not help.
    #[error("message to {to} rejected: {reason}")]
    Rejected { to: String, reason: String },

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("send timed out")]
    Timeout,
}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        matches!(self, TransportError::Unavailable(_) | TransportError::Timeout)
    }
}

/// Delivers a message to its recipient.
///
/// A send that returned `Ok` is considered delivered; there is no recall.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T> MessageTransport for Arc<T>
where
    T: MessageTransport + ?Sized,
{
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        (**self).send(message).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
