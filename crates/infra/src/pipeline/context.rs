use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use procura_ai::{AiError, Prompt, TextGenerator};
use procura_core::{CycleId, IntentId, StatusGuard};

use super::approval::ApprovalGate;
use super::dispatch::RfqDispatcher;
use super::events::{CycleEventBus, CycleEvents};
use super::issuer::PurchaseOrderIssuer;
use super::logistics::LogisticsHandoff;
use super::quote_intake::QuoteIntake;
use super::ranking::QuoteRanker;
use super::requirement::RequirementIntake;
use crate::config::{Channels, ProcuraConfig};
use crate::ledger::DecisionLedger;
use crate::retry::{RetryPolicy, retry};
use crate::saga::IntentStatus;
use crate::store::{ProcurementStore, StoreResult};
use crate::transport::{MessageTransport, OutboundMessage, TransportError};

/// Tunables shared by every stage.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub channels: Channels,
    pub max_concurrency: usize,
    pub collaborator_timeout: Duration,
    pub quote_cooldown: Duration,
    pub intent_stale_after: Duration,
    pub store_retry: RetryPolicy,
    pub text_retry: RetryPolicy,
    pub transport_retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&ProcuraConfig::default())
    }
}

impl From<&ProcuraConfig> for PipelineSettings {
    fn from(config: &ProcuraConfig) -> Self {
        Self {
            channels: config.channels.clone(),
            max_concurrency: config.max_concurrency.max(1),
            collaborator_timeout: config.collaborator_timeout,
            quote_cooldown: config.quote_cooldown,
            intent_stale_after: config.intent_stale_after,
            store_retry: config.store_retry.clone(),
            text_retry: config.text_retry.clone(),
            transport_retry: config.transport_retry.clone(),
        }
    }
}

/// Collaborators injected once per process and shared by every stage.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn ProcurementStore>,
    pub text: Arc<dyn TextGenerator>,
    pub transport: Arc<dyn MessageTransport>,
    pub ledger: DecisionLedger,
    pub bus: Arc<CycleEventBus>,
    pub settings: PipelineSettings,
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn ProcurementStore>,
        text: Arc<dyn TextGenerator>,
        transport: Arc<dyn MessageTransport>,
        bus: Arc<CycleEventBus>,
        settings: PipelineSettings,
    ) -> Self {
        let ledger = DecisionLedger::new(store.clone(), settings.store_retry.clone());
        Self {
            store,
            text,
            transport,
            ledger,
            bus,
            settings,
        }
    }

    /// Event publisher for a new cycle.
    pub fn events(&self) -> CycleEvents {
        CycleEvents::new(self.bus.clone(), CycleId::new())
    }

    pub fn requirements(&self) -> RequirementIntake {
        RequirementIntake::new(self.clone())
    }

    pub fn dispatcher(&self) -> RfqDispatcher {
        RfqDispatcher::new(self.clone(), self.events())
    }

    pub fn quote_intake(&self) -> QuoteIntake {
        QuoteIntake::new(self.clone(), self.events())
    }

    pub fn ranker(&self) -> QuoteRanker {
        QuoteRanker::new(self.clone(), self.events())
    }

    pub fn approval_gate(&self) -> ApprovalGate {
        ApprovalGate::new(self.clone(), self.events())
    }

    pub fn issuer(&self) -> PurchaseOrderIssuer {
        PurchaseOrderIssuer::new(self.clone(), self.events())
    }

    pub fn logistics(&self) -> LogisticsHandoff {
        LogisticsHandoff::new(self.clone(), self.events())
    }

    /// Store read under `store_retry`.
    pub(crate) async fn read<T, F, Fut>(&self, operation: &'static str, op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        retry(&self.settings.store_retry, operation, op).await
    }

    /// Text generation, each attempt bounded by `collaborator_timeout`.
    pub(crate) async fn generate(&self, prompt: &Prompt) -> Result<String, AiError> {
        let limit = self.settings.collaborator_timeout;
        retry(&self.settings.text_retry, "generate_text", move || async move {
            match timeout(limit, self.text.generate(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(AiError::Timeout),
            }
        })
        .await
    }

    /// Message delivery, each attempt bounded by `collaborator_timeout`.
    pub(crate) async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let limit = self.settings.collaborator_timeout;
        retry(&self.settings.transport_retry, "send_message", move || async move {
            match timeout(limit, self.transport.send(message)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            }
        })
        .await
    }

    pub(crate) fn message(
        &self,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> OutboundMessage {
        OutboundMessage::new(self.settings.channels.sender.clone(), to, subject, body)
    }

    /// Close an ATTEMPTING intent. Failures are logged; the intent then stays
    /// ATTEMPTING and is picked up by reconciliation.
    pub(crate) async fn close_intent(&self, id: IntentId, to: IntentStatus, note: Option<String>) {
        let guard = match StatusGuard::new(IntentStatus::Attempting, to) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(intent = %id, error = %err, "refusing to close intent");
                return;
            }
        };
        match self.store.close_intent(id, guard, note).await {
            Ok(true) => {}
            Ok(false) => warn!(intent = %id, status = %to, "intent was already closed"),
            Err(err) => warn!(intent = %id, status = %to, error = %err, "failed to close intent"),
        }
    }

    /// Record a completed leg. A failure only costs a possible duplicate send on retry.
    pub(crate) async fn record_leg(&self, id: IntentId, leg: &str) {
        if let Err(err) = self.store.record_intent_leg(id, leg).await {
            warn!(intent = %id, leg, error = %err, "failed to record intent leg");
        }
    }
}
