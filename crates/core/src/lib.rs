//! `procura-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod state;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{
    ApprovalId, CycleId, DecisionId, IntentId, ItemId, PurchaseOrderId, QuoteId, RfqId,
    RoundId, ShipmentId, VendorId,
};
pub use state::{StateMachine, StatusGuard};
pub use value_object::{Money, ValueObject};
