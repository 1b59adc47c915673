//! Purchasing domain: procurement entities and the pure rules that drive them.
//!
//! This crate contains business rules implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage). The pipeline in `procura-infra` reads rows from the
//! store, feeds them through these rules, and persists the outcome.

pub mod approval;
pub mod decision;
pub mod inventory;
pub mod numbering;
pub mod order;
pub mod quote;
pub mod ranking;
pub mod requirement;
pub mod rfq;
pub mod round;
pub mod shipment;

/// Implements `Display` for a status enum through `StateMachine::as_str`.
macro_rules! impl_status_display {
    ($t:ty) => {
        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(procura_core::StateMachine::as_str(*self))
            }
        }

        impl core::str::FromStr for $t {
            type Err = procura_core::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$t as procura_core::StateMachine>::parse(s)
            }
        }
    };
}
pub(crate) use impl_status_display;

pub use approval::{Approval, ApprovalDecision, ApprovalStatus, NewApproval};
pub use decision::{Agent, Confidence, DecisionRecord, NewDecision};
pub use inventory::{AnalystReport, InventoryItem, SourcingVendor, Vendor, VendorOffer};
pub use numbering::{po_number, rfq_number};
pub use order::{
    NewPurchaseOrder, OrderContext, OrderTerms, PurchaseOrder, PurchaseOrderDocument,
    PurchaseOrderStatus,
};
pub use quote::{NewQuote, Quote, QuoteCandidate, QuoteContext, QuoteStatus};
pub use ranking::{AdvisoryScore, Ranking, rank_quotes};
pub use requirement::{Requirement, adjusted_reorder, plan_requirements};
pub use rfq::{NewRfq, Rfq, RfqStatus};
pub use round::{RoundPhase, RoundSummary};
pub use shipment::{NewShipment, Shipment, ShipmentStatus};
