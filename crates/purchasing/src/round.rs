//! Dispatch rounds and their derived phase.
//!
//! A round is the set of RFQs dispatched for one item in one dispatch invocation. Its
//! phase is never stored; it is derived from the rows the round has produced so far,
//! so a re-run of the pipeline resumes wherever the previous run stopped.

use serde::{Deserialize, Serialize};

use procura_core::{ItemId, RoundId};

use crate::approval::{Approval, ApprovalStatus};
use crate::order::PurchaseOrder;
use crate::quote::{Quote, QuoteStatus};
use crate::rfq::{Rfq, RfqStatus};
use crate::shipment::{Shipment, ShipmentStatus};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitingQuotes,
    Quoted,
    Awarded,
    AwaitingApproval,
    Approved,
    Declined,
    Ordered,
    Shipped,
    Delivered,
}

impl RoundPhase {
    /// Open rounds block a new dispatch for the same item.
    pub fn is_open(self) -> bool {
        !matches!(self, RoundPhase::Delivered | RoundPhase::Declined)
    }

    /// The downstream chain still has work to do.
    pub fn is_actionable(self) -> bool {
        self.is_open() && self != RoundPhase::Shipped
    }

    /// Quotes have been observed (the ranker has something to look at).
    pub fn has_quotes(self) -> bool {
        self != RoundPhase::AwaitingQuotes
    }
}

/// Everything persisted so far for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: RoundId,
    pub item_id: ItemId,
    pub rfqs: Vec<Rfq>,
    pub quotes: Vec<Quote>,
    /// Latest approval for the selected quote.
    pub approval: Option<Approval>,
    pub purchase_order: Option<PurchaseOrder>,
    pub shipment: Option<Shipment>,
}

impl RoundSummary {
    pub fn phase(&self) -> RoundPhase {
        if let Some(shipment) = &self.shipment {
            return if shipment.status == ShipmentStatus::Delivered {
                RoundPhase::Delivered
            } else {
                RoundPhase::Shipped
            };
        }
        if self.purchase_order.is_some() {
            return RoundPhase::Ordered;
        }
        if let Some(approval) = &self.approval {
            return match approval.status {
                ApprovalStatus::Rejected => RoundPhase::Declined,
                ApprovalStatus::Approved => RoundPhase::Approved,
                ApprovalStatus::Pending => RoundPhase::AwaitingApproval,
            };
        }
        if self.selected_quote().is_some() {
            return RoundPhase::Awarded;
        }
        let quoted = self.quotes.iter().any(|q| {
            q.status == QuoteStatus::Received
                && self
                    .rfqs
                    .iter()
                    .any(|r| r.id == q.rfq_id && r.status == RfqStatus::Quoted)
        });
        if quoted {
            RoundPhase::Quoted
        } else {
            RoundPhase::AwaitingQuotes
        }
    }

    pub fn selected_quote(&self) -> Option<&Quote> {
        self.quotes.iter().find(|q| q.status == QuoteStatus::Selected)
    }

    pub fn is_open(&self) -> bool {
        self.phase().is_open()
    }

    pub fn is_actionable(&self) -> bool {
        self.phase().is_actionable()
    }
}
