//! The procurement pipeline: independently callable stages plus the cycle orchestrator.
//!
//! Every stage returns a report or outcome value; failures of one unit of work (one
//! RFQ, one quote, one item) are captured as [`UnitFailure`]s and never abort the
//! stage. Each send-then-persist pair runs as a saga guarded by a persisted intent.

pub mod approval;
pub mod context;
pub mod cycle;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod issuer;
pub mod logistics;
pub mod quote_intake;
pub mod ranking;
pub mod requirement;

#[cfg(test)]
pub(crate) mod test_support;

pub use approval::{ApprovalGate, ApprovalOutcome};
pub use context::{PipelineContext, PipelineSettings};
pub use cycle::{CycleOrchestrator, CycleOutcome, CycleStatus, ItemOutcome, ItemStatus};
pub use dispatch::{DispatchReport, DispatchedRfq, RfqDispatcher, SkippedUnit};
pub use error::{Stage, StageError, UnitFailure};
pub use events::{CycleEvent, CycleEventDetail, CycleEvents, spawn_event_log};
pub use issuer::{IssueOutcome, MissingLeg, PurchaseOrderIssuer};
pub use logistics::{HandoffOutcome, LogisticsHandoff};
pub use quote_intake::{IntakeReport, ObservedQuote, QuoteIntake};
pub use ranking::{QuoteRanker, RankOutcome, Selection};
pub use requirement::RequirementIntake;
