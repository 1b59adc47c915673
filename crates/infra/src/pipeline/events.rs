//! Structured progress events published while a cycle runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use procura_core::{ApprovalId, CycleId, ItemId, Money, QuoteId, RfqId, ShipmentId, VendorId};
use procura_events::{Event, EventBus, EventEnvelope, Subscription};

use super::cycle::CycleStatus;
use super::error::UnitFailure;
use super::issuer::MissingLeg;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CycleEventDetail {
    #[serde(rename = "cycle.started")]
    CycleStarted,
    #[serde(rename = "rfq.dispatched")]
    RfqDispatched {
        item_id: ItemId,
        vendor_id: VendorId,
        rfq_number: String,
    },
    #[serde(rename = "unit.failed")]
    UnitFailed { failure: UnitFailure },
    #[serde(rename = "quote.observed")]
    QuoteObserved { rfq_id: RfqId, quote_id: QuoteId },
    #[serde(rename = "quote.selected")]
    QuoteSelected {
        item_id: ItemId,
        quote_id: QuoteId,
        vendor_id: VendorId,
        price: Money,
    },
    #[serde(rename = "approval.requested")]
    ApprovalRequested {
        quote_id: QuoteId,
        approval_id: ApprovalId,
    },
    #[serde(rename = "purchase_order.issued")]
    PurchaseOrderIssued {
        quote_id: QuoteId,
        po_number: String,
        amount: Money,
    },
    #[serde(rename = "purchase_order.partial")]
    PurchaseOrderPartial {
        quote_id: QuoteId,
        po_number: String,
        missing: MissingLeg,
    },
    #[serde(rename = "shipment.scheduled")]
    ShipmentScheduled {
        po_number: String,
        shipment_id: ShipmentId,
        expected_arrival: DateTime<Utc>,
    },
    #[serde(rename = "cycle.finished")]
    CycleFinished {
        status: CycleStatus,
        steps_completed: u8,
    },
}

impl CycleEventDetail {
    pub fn name(&self) -> &'static str {
        match self {
            CycleEventDetail::CycleStarted => "cycle.started",
            CycleEventDetail::RfqDispatched { .. } => "rfq.dispatched",
            CycleEventDetail::UnitFailed { .. } => "unit.failed",
            CycleEventDetail::QuoteObserved { .. } => "quote.observed",
            CycleEventDetail::QuoteSelected { .. } => "quote.selected",
            CycleEventDetail::ApprovalRequested { .. } => "approval.requested",
            CycleEventDetail::PurchaseOrderIssued { .. } => "purchase_order.issued",
            CycleEventDetail::PurchaseOrderPartial { .. } => "purchase_order.partial",
            CycleEventDetail::ShipmentScheduled { .. } => "shipment.scheduled",
            CycleEventDetail::CycleFinished { .. } => "cycle.finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEvent {
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: CycleEventDetail,
}

impl CycleEvent {
    pub fn now(detail: CycleEventDetail) -> Self {
        Self {
            occurred_at: Utc::now(),
            detail,
        }
    }
}

impl Event for CycleEvent {
    fn event_type(&self) -> &'static str {
        self.detail.name()
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

pub type CycleEventBus = dyn EventBus<EventEnvelope<CycleEvent>>;

/// Publishes the events of one cycle with a per-cycle sequence number.
///
/// Publishing is best effort: a bus failure is logged and the cycle carries on.
#[derive(Clone)]
pub struct CycleEvents {
    bus: Arc<CycleEventBus>,
    cycle_id: CycleId,
    sequence: Arc<AtomicU64>,
}

impl CycleEvents {
    pub fn new(bus: Arc<CycleEventBus>, cycle_id: CycleId) -> Self {
        Self {
            bus,
            cycle_id,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }

    pub fn emit(&self, detail: CycleEventDetail) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = CycleEvent::now(detail);
        debug!(cycle = %self.cycle_id, sequence, event = event.event_type(), "cycle event");
        if let Err(err) = self
            .bus
            .publish(EventEnvelope::new(self.cycle_id, sequence, event))
        {
            warn!(cycle = %self.cycle_id, error = %err, "cycle event dropped");
        }
    }

    /// Log and publish a unit failure, handing it back for the stage report.
    pub fn failed(&self, failure: UnitFailure) -> UnitFailure {
        warn!(
            stage = ?failure.stage,
            unit = %failure.unit,
            disposition = ?failure.disposition,
            error = %failure.error,
            "unit failed"
        );
        self.emit(CycleEventDetail::UnitFailed {
            failure: failure.clone(),
        });
        failure
    }
}

/// Forward every cycle event on `events` to `tracing` from a dedicated thread.
///
/// The thread ends once the bus is dropped and returns how many events it logged.
pub fn spawn_event_log(
    events: Subscription<EventEnvelope<CycleEvent>>,
) -> std::io::Result<JoinHandle<usize>> {
    thread::Builder::new()
        .name("procura-events".to_string())
        .spawn(move || {
            let mut logged = 0;
            while let Ok(envelope) = events.recv() {
                let event = envelope.payload();
                let detail = serde_json::to_string(&event.detail).unwrap_or_default();
                info!(
                    cycle = %envelope.cycle_id(),
                    sequence = envelope.sequence_number(),
                    event = event.event_type(),
                    %detail,
                    "cycle event"
                );
                logged += 1;
            }
            logged
        })
}
