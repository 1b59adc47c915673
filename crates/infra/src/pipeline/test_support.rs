//! Shared fixtures for stage tests: an in-memory store, a recording transport and
//! template prose, with retries off and no quote cooldown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use procura_ai::TemplateTextGenerator;
use procura_core::{
    ApprovalId, IntentId, ItemId, Money, QuoteId, RfqId, RoundId, ShipmentId, StatusGuard,
    VendorId,
};
use procura_events::{EventEnvelope, InMemoryEventBus};
use procura_purchasing::{
    AnalystReport, Approval, ApprovalStatus, DecisionRecord, InventoryItem, NewApproval,
    NewDecision, NewPurchaseOrder, NewQuote, NewRfq, NewShipment, OrderContext, PurchaseOrder,
    Quote, QuoteCandidate, QuoteContext, Rfq, RfqStatus, RoundSummary, Shipment, ShipmentStatus,
    SourcingVendor, VendorOffer,
};

use super::context::{PipelineContext, PipelineSettings};
use super::events::CycleEvent;
use crate::retry::RetryPolicy;
use crate::saga::{IntentKind, IntentStatus, NewIntent, SagaIntent};
use crate::store::{InMemoryProcurementStore, ProcurementStore, StoreResult};
use crate::transport::RecordingTransport;

pub(crate) fn usd(units: i64) -> Money {
    Money::from_major(units).unwrap()
}

pub(crate) fn test_settings() -> PipelineSettings {
    PipelineSettings {
        quote_cooldown: Duration::ZERO,
        collaborator_timeout: Duration::from_secs(5),
        store_retry: RetryPolicy::no_retry(),
        text_retry: RetryPolicy::no_retry(),
        transport_retry: RetryPolicy::no_retry(),
        ..PipelineSettings::default()
    }
}

pub(crate) struct Harness {
    pub store: Arc<InMemoryProcurementStore>,
    pub transport: Arc<RecordingTransport>,
    pub bus: Arc<InMemoryEventBus<EventEnvelope<CycleEvent>>>,
    pub ctx: PipelineContext,
    pub item: ItemId,
    pub v1: VendorId,
    pub v2: VendorId,
}

impl Harness {
    /// No inventory, no vendors.
    pub fn empty() -> Self {
        let store = Arc::new(InMemoryProcurementStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let ctx = PipelineContext::new(
            store.clone(),
            Arc::new(TemplateTextGenerator::new()),
            transport.clone(),
            bus.clone(),
            test_settings(),
        );
        Self {
            store,
            transport,
            bus,
            ctx,
            item: ItemId::new(0),
            v1: VendorId::new(0),
            v2: VendorId::new(0),
        }
    }

    /// The scenario, with stages reaching the store through a [`DelayedStore`] so that
    /// concurrent callers interleave at their claim points.
    pub fn scenario_delayed(delay: Duration) -> Self {
        let mut h = Self::scenario();
        h.ctx = PipelineContext::new(
            Arc::new(DelayedStore::new(h.store.clone(), delay)),
            Arc::new(TemplateTextGenerator::new()),
            h.transport.clone(),
            h.bus.clone(),
            test_settings(),
        );
        h
    }

    /// Item "Widget A" (stock 5, reorder 20) with a +20 % trend, offered by
    /// V1 (10, rating 4, 5 days) and V2 (8, rating 3, 7 days).
    pub fn scenario() -> Self {
        let mut h = Self::empty();
        h.store.add_analyst_report(20.0, "demand rising").unwrap();
        h.item = h.add_item("Widget A", 5, 20, 9);
        h.v1 = h.add_vendor("V1", "v1@example.com", 5, h.item, 10, 4.0);
        h.v2 = h.add_vendor("V2", "v2@example.com", 7, h.item, 8, 3.0);
        h
    }

    pub fn add_item(&self, name: &str, stock: i64, reorder: i64, price: i64) -> ItemId {
        self.store.add_item(name, stock, reorder, usd(price)).unwrap()
    }

    pub fn add_vendor(
        &self,
        name: &str,
        email: &str,
        lead_days: i32,
        item: ItemId,
        price: i64,
        rating: f64,
    ) -> VendorId {
        let vendor = self.store.add_vendor(name, email, true, lead_days).unwrap();
        self.store
            .add_offer(VendorOffer {
                item_id: item,
                vendor_id: vendor,
                unit_price: usd(price),
                rating,
            })
            .unwrap();
        vendor
    }

    /// Record a vendor's reply to an RFQ.
    pub async fn reply(&self, rfq: RfqId, price: i64, delivery_days: i32) -> Quote {
        self.store
            .insert_quote(NewQuote {
                rfq_id: rfq,
                price: usd(price),
                delivery_days,
                validity_days: 30,
            })
            .await
            .unwrap()
    }

    /// Both scenario vendors reply with their offer price and lead time.
    pub async fn reply_all(&self) -> Vec<Quote> {
        let rfqs: Vec<Rfq> = self.store.rfqs().unwrap();
        let mut quotes = Vec::new();
        for rfq in rfqs {
            let (price, days) = if rfq.vendor_id == self.v1 { (10, 5) } else { (8, 7) };
            quotes.push(self.reply(rfq.id, price, days).await);
        }
        quotes
    }
}

/// Delegates to an in-memory store, sleeping before the claiming writes
/// (`begin_intent`, `award_quote`).
///
/// Two tasks joined on one runtime both pass their initial reads, then wake in order
/// and run to completion one after the other: the second claim lands after the first
/// caller has already committed.
pub(crate) struct DelayedStore {
    inner: Arc<InMemoryProcurementStore>,
    delay: Duration,
}

impl DelayedStore {
    pub fn new(inner: Arc<InMemoryProcurementStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ProcurementStore for DelayedStore {
    async fn inventory_count(&self) -> StoreResult<i64> {
        self.inner.inventory_count().await
    }

    async fn low_stock_items(&self) -> StoreResult<Vec<InventoryItem>> {
        self.inner.low_stock_items().await
    }

    async fn item(&self, id: ItemId) -> StoreResult<Option<InventoryItem>> {
        self.inner.item(id).await
    }

    async fn approved_vendors(&self, item: ItemId) -> StoreResult<Vec<SourcingVendor>> {
        self.inner.approved_vendors(item).await
    }

    async fn latest_analyst_report(&self) -> StoreResult<Option<AnalystReport>> {
        self.inner.latest_analyst_report().await
    }

    async fn insert_rfq(&self, rfq: NewRfq) -> StoreResult<Rfq> {
        self.inner.insert_rfq(rfq).await
    }

    async fn rfq(&self, id: RfqId) -> StoreResult<Option<Rfq>> {
        self.inner.rfq(id).await
    }

    async fn pending_rfq(&self, item: ItemId, vendor: VendorId) -> StoreResult<Option<Rfq>> {
        self.inner.pending_rfq(item, vendor).await
    }

    async fn pending_rfqs_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Rfq>> {
        self.inner.pending_rfqs_created_before(cutoff).await
    }

    async fn transition_rfq(&self, id: RfqId, guard: StatusGuard<RfqStatus>) -> StoreResult<bool> {
        self.inner.transition_rfq(id, guard).await
    }

    async fn latest_round(&self, item: ItemId) -> StoreResult<Option<RoundSummary>> {
        self.inner.latest_round(item).await
    }

    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        self.inner.insert_quote(quote).await
    }

    async fn received_quote(&self, rfq: RfqId) -> StoreResult<Option<Quote>> {
        self.inner.received_quote(rfq).await
    }

    async fn quote_candidates(&self, round: RoundId) -> StoreResult<Vec<QuoteCandidate>> {
        self.inner.quote_candidates(round).await
    }

    async fn award_quote(&self, round: RoundId, winner: QuoteId) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.award_quote(round, winner).await
    }

    async fn quote_context(&self, quote: QuoteId) -> StoreResult<Option<QuoteContext>> {
        self.inner.quote_context(quote).await
    }

    async fn insert_approval(&self, approval: NewApproval) -> StoreResult<Approval> {
        self.inner.insert_approval(approval).await
    }

    async fn approval(&self, id: ApprovalId) -> StoreResult<Option<Approval>> {
        self.inner.approval(id).await
    }

    async fn latest_approval(&self, quote: QuoteId) -> StoreResult<Option<Approval>> {
        self.inner.latest_approval(quote).await
    }

    async fn decide_approval(
        &self,
        id: ApprovalId,
        guard: StatusGuard<ApprovalStatus>,
        decided_by: &str,
    ) -> StoreResult<bool> {
        self.inner.decide_approval(id, guard, decided_by).await
    }

    async fn pending_approvals(&self) -> StoreResult<Vec<Approval>> {
        self.inner.pending_approvals().await
    }

    async fn purchase_order_for_quote(&self, quote: QuoteId) -> StoreResult<Option<PurchaseOrder>> {
        self.inner.purchase_order_for_quote(quote).await
    }

    async fn insert_purchase_order(&self, order: NewPurchaseOrder) -> StoreResult<PurchaseOrder> {
        self.inner.insert_purchase_order(order).await
    }

    async fn order_context(&self, po_number: &str) -> StoreResult<Option<OrderContext>> {
        self.inner.order_context(po_number).await
    }

    async fn shipment_for_po(&self, po_number: &str) -> StoreResult<Option<Shipment>> {
        self.inner.shipment_for_po(po_number).await
    }

    async fn insert_shipment(&self, shipment: NewShipment) -> StoreResult<Shipment> {
        self.inner.insert_shipment(shipment).await
    }

    async fn shipment(&self, id: ShipmentId) -> StoreResult<Option<Shipment>> {
        self.inner.shipment(id).await
    }

    async fn transition_shipment(
        &self,
        id: ShipmentId,
        guard: StatusGuard<ShipmentStatus>,
    ) -> StoreResult<bool> {
        self.inner.transition_shipment(id, guard).await
    }

    async fn append_decision(&self, decision: NewDecision) -> StoreResult<DecisionRecord> {
        self.inner.append_decision(decision).await
    }

    async fn recent_decisions(&self, limit: usize) -> StoreResult<Vec<DecisionRecord>> {
        self.inner.recent_decisions(limit).await
    }

    async fn begin_intent(&self, intent: NewIntent) -> StoreResult<Option<SagaIntent>> {
        tokio::time::sleep(self.delay).await;
        self.inner.begin_intent(intent).await
    }

    async fn latest_intent(&self, kind: IntentKind, key: &str) -> StoreResult<Option<SagaIntent>> {
        self.inner.latest_intent(kind, key).await
    }

    async fn record_intent_leg(&self, id: IntentId, leg: &str) -> StoreResult<()> {
        self.inner.record_intent_leg(id, leg).await
    }

    async fn close_intent(
        &self,
        id: IntentId,
        guard: StatusGuard<IntentStatus>,
        note: Option<String>,
    ) -> StoreResult<bool> {
        self.inner.close_intent(id, guard, note).await
    }

    async fn stale_intents(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SagaIntent>> {
        self.inner.stale_intents(cutoff).await
    }
}
