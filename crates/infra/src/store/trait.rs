use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use procura_core::{
    ApprovalId, DomainError, IntentId, ItemId, QuoteId, RfqId, RoundId, ShipmentId, StatusGuard,
    VendorId,
};
use procura_purchasing::{
    AnalystReport, Approval, ApprovalStatus, DecisionRecord, InventoryItem, NewApproval,
    NewDecision, NewPurchaseOrder, NewQuote, NewRfq, NewShipment, OrderContext, PurchaseOrder,
    Quote, QuoteCandidate, QuoteContext, Rfq, RfqStatus, RoundSummary, Shipment, ShipmentStatus,
    SourcingVendor,
};

use crate::retry::Transient;
use crate::saga::{IntentKind, IntentStatus, NewIntent, SagaIntent};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors, although domain
/// rejections raised inside a write (illegal transitions, invalid rows) are carried
/// through so callers can tell them apart from outages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached (transient).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness or optimistic-status constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    IllegalTransition(String),

    /// The row being written failed validation.
    #[error("invalid: {0}")]
    Invalid(String),

    /// A persisted row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::IllegalTransition { .. } => StoreError::IllegalTransition(err.to_string()),
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::NotFound => StoreError::NotFound("entity".to_string()),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StoreError::Invalid(msg),
            DomainError::InvariantViolation(msg) => StoreError::Invalid(msg),
        }
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Procurement persistence boundary.
///
/// The store is the single authority for entity state. Every status-advancing write is
/// guarded: it applies only while the row is still in the guard's expected status and
/// reports `false` (a no-op) otherwise.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    // --- reference data -------------------------------------------------------------

    async fn inventory_count(&self) -> StoreResult<i64>;

    /// Items with `current_stock < reorder_level`.
    async fn low_stock_items(&self) -> StoreResult<Vec<InventoryItem>>;

    async fn item(&self, id: ItemId) -> StoreResult<Option<InventoryItem>>;

    /// Approved vendors offering the item, rating descending then vendor id ascending.
    async fn approved_vendors(&self, item: ItemId) -> StoreResult<Vec<SourcingVendor>>;

    async fn latest_analyst_report(&self) -> StoreResult<Option<AnalystReport>>;

    // --- rfqs -----------------------------------------------------------------------

    /// Insert a PENDING RFQ. `Conflict` if the number is taken or the (item, vendor)
    /// pair already has a PENDING RFQ.
    async fn insert_rfq(&self, rfq: NewRfq) -> StoreResult<Rfq>;

    async fn rfq(&self, id: RfqId) -> StoreResult<Option<Rfq>>;

    async fn pending_rfq(&self, item: ItemId, vendor: VendorId) -> StoreResult<Option<Rfq>>;

    /// PENDING RFQs created at or before `cutoff`, oldest first.
    async fn pending_rfqs_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Rfq>>;

    async fn transition_rfq(&self, id: RfqId, guard: StatusGuard<RfqStatus>) -> StoreResult<bool>;

    /// Everything persisted for the item's newest round.
    async fn latest_round(&self, item: ItemId) -> StoreResult<Option<RoundSummary>>;

    // --- quotes ---------------------------------------------------------------------

    /// Record a vendor response against an RFQ (status RECEIVED).
    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote>;

    /// A RECEIVED quote for the RFQ, if any (lowest quote id first).
    async fn received_quote(&self, rfq: RfqId) -> StoreResult<Option<Quote>>;

    /// RECEIVED quotes on QUOTED RFQs of the round, with vendor name and rating.
    async fn quote_candidates(&self, round: RoundId) -> StoreResult<Vec<QuoteCandidate>>;

    /// Atomically mark `winner` SELECTED and every other RECEIVED quote of the round
    /// REJECTED. `false` if the winner is no longer RECEIVED or the round already has a
    /// SELECTED quote.
    async fn award_quote(&self, round: RoundId, winner: QuoteId) -> StoreResult<bool>;

    async fn quote_context(&self, quote: QuoteId) -> StoreResult<Option<QuoteContext>>;

    // --- approvals ------------------------------------------------------------------

    /// `Conflict` if the quote already has an approval.
    async fn insert_approval(&self, approval: NewApproval) -> StoreResult<Approval>;

    async fn approval(&self, id: ApprovalId) -> StoreResult<Option<Approval>>;

    /// Most recently requested approval for the quote.
    async fn latest_approval(&self, quote: QuoteId) -> StoreResult<Option<Approval>>;

    async fn decide_approval(
        &self,
        id: ApprovalId,
        guard: StatusGuard<ApprovalStatus>,
        decided_by: &str,
    ) -> StoreResult<bool>;

    async fn pending_approvals(&self) -> StoreResult<Vec<Approval>>;

    // --- purchase orders & shipments ------------------------------------------------

    async fn purchase_order_for_quote(&self, quote: QuoteId) -> StoreResult<Option<PurchaseOrder>>;

    /// `Conflict` if the quote already has a PO or the number is taken.
    async fn insert_purchase_order(&self, order: NewPurchaseOrder) -> StoreResult<PurchaseOrder>;

    async fn order_context(&self, po_number: &str) -> StoreResult<Option<OrderContext>>;

    async fn shipment_for_po(&self, po_number: &str) -> StoreResult<Option<Shipment>>;

    /// `Conflict` if the PO already has a shipment.
    async fn insert_shipment(&self, shipment: NewShipment) -> StoreResult<Shipment>;

    async fn shipment(&self, id: ShipmentId) -> StoreResult<Option<Shipment>>;

    /// `false` when the shipment is no longer in `guard.from()`.
    async fn transition_shipment(
        &self,
        id: ShipmentId,
        guard: StatusGuard<ShipmentStatus>,
    ) -> StoreResult<bool>;

    // --- decision ledger ------------------------------------------------------------

    async fn append_decision(&self, decision: NewDecision) -> StoreResult<DecisionRecord>;

    /// Newest first.
    async fn recent_decisions(&self, limit: usize) -> StoreResult<Vec<DecisionRecord>>;

    // --- saga intents ---------------------------------------------------------------

    /// Open an ATTEMPTING intent. `None` if another ATTEMPTING intent exists for the
    /// same (kind, key).
    async fn begin_intent(&self, intent: NewIntent) -> StoreResult<Option<SagaIntent>>;

    /// Most recently created intent for (kind, key), in any status.
    async fn latest_intent(&self, kind: IntentKind, key: &str) -> StoreResult<Option<SagaIntent>>;

    async fn record_intent_leg(&self, id: IntentId, leg: &str) -> StoreResult<()>;

    async fn close_intent(
        &self,
        id: IntentId,
        guard: StatusGuard<IntentStatus>,
        note: Option<String>,
    ) -> StoreResult<bool>;

    /// ATTEMPTING intents not updated since `cutoff`.
    async fn stale_intents(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SagaIntent>>;
}
