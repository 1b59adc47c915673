use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use procura_core::{
    ApprovalId, DecisionId, IntentId, ItemId, PurchaseOrderId, QuoteId, RfqId, RoundId,
    ShipmentId, StatusGuard, VendorId,
};
use procura_purchasing::{
    AnalystReport, Approval, ApprovalStatus, DecisionRecord, InventoryItem, NewApproval,
    NewDecision, NewPurchaseOrder, NewQuote, NewRfq, NewShipment, OrderContext, PurchaseOrder,
    PurchaseOrderStatus, Quote, QuoteCandidate, QuoteContext, QuoteStatus, Rfq, RfqStatus,
    RoundSummary, Shipment, ShipmentStatus, SourcingVendor, Vendor, VendorOffer,
};

use super::r#trait::{ProcurementStore, StoreError, StoreResult};
use crate::saga::{IntentKind, IntentStatus, NewIntent, SagaIntent};

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<ItemId, InventoryItem>,
    vendors: BTreeMap<VendorId, Vendor>,
    offers: Vec<VendorOffer>,
    reports: Vec<AnalystReport>,
    rfqs: BTreeMap<RfqId, Rfq>,
    quotes: BTreeMap<QuoteId, Quote>,
    approvals: BTreeMap<ApprovalId, Approval>,
    orders: BTreeMap<PurchaseOrderId, PurchaseOrder>,
    shipments: BTreeMap<ShipmentId, Shipment>,
    decisions: Vec<DecisionRecord>,
    intents: Vec<SagaIntent>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn quote_context(&self, quote_id: QuoteId) -> Option<QuoteContext> {
        let quote = self.quotes.get(&quote_id)?;
        let rfq = self.rfqs.get(&quote.rfq_id)?;
        let item = self.items.get(&rfq.item_id)?;
        let vendor = self.vendors.get(&quote.vendor_id)?;
        Some(QuoteContext {
            quote_id,
            rfq_id: rfq.id,
            round: rfq.round,
            status: quote.status,
            item_id: item.id,
            item_name: item.name.clone(),
            required_qty: rfq.required_qty,
            vendor_id: vendor.id,
            vendor_name: vendor.name.clone(),
            vendor_email: vendor.email.clone(),
            payment_terms: vendor.payment_terms.clone(),
            price: quote.price,
            delivery_days: quote.delivery_days,
        })
    }

    fn round_quotes(&self, round: RoundId) -> impl Iterator<Item = &Quote> {
        self.quotes.values().filter(move |q| {
            self.rfqs
                .get(&q.rfq_id)
                .is_some_and(|rfq| rfq.round == round)
        })
    }

    fn latest_approval(&self, quote: QuoteId) -> Option<&Approval> {
        self.approvals
            .values()
            .filter(|a| a.quote_id == quote)
            .max_by_key(|a| a.id)
    }
}

/// In-memory procurement store.
///
/// Intended for tests/dev. Mirrors the Postgres store's uniqueness and status-guard
/// rules; `set_unavailable` simulates an outage for every subsequent call.
#[derive(Debug, Default)]
pub struct InMemoryProcurementStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl InMemoryProcurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    // --- seeding (reference data is managed outside the pipeline) -------------------

    pub fn add_item(
        &self,
        name: impl Into<String>,
        current_stock: i64,
        reorder_level: i64,
        unit_price: procura_core::Money,
    ) -> StoreResult<ItemId> {
        let mut state = self.write()?;
        let id = ItemId::new(state.next_id());
        let item = InventoryItem {
            id,
            name: name.into(),
            current_stock,
            reorder_level,
            unit_price,
        };
        item.validate()?;
        state.items.insert(id, item);
        Ok(id)
    }

    pub fn add_vendor(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        is_approved: bool,
        lead_time_days: i32,
    ) -> StoreResult<VendorId> {
        let mut state = self.write()?;
        let id = VendorId::new(state.next_id());
        state.vendors.insert(
            id,
            Vendor {
                id,
                name: name.into(),
                email: email.into(),
                is_approved,
                lead_time_days,
                payment_terms: "Net 30".to_string(),
            },
        );
        Ok(id)
    }

    pub fn add_offer(&self, offer: VendorOffer) -> StoreResult<()> {
        offer.validate()?;
        let mut state = self.write()?;
        if !state.items.contains_key(&offer.item_id) || !state.vendors.contains_key(&offer.vendor_id) {
            return Err(StoreError::NotFound(format!(
                "offer references unknown item {} or vendor {}",
                offer.item_id, offer.vendor_id
            )));
        }
        state
            .offers
            .retain(|o| !(o.item_id == offer.item_id && o.vendor_id == offer.vendor_id));
        state.offers.push(offer);
        Ok(())
    }

    pub fn add_analyst_report(&self, trend_percent: f64, summary: impl Into<String>) -> StoreResult<()> {
        let mut state = self.write()?;
        state.reports.push(AnalystReport {
            trend_percent,
            scrap_rate: 0.0,
            summary: summary.into(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// Demo reference data: one low-stock item sourced from two approved vendors, and a
    /// rising demand trend. Lets a local instance run a full cycle without Postgres.
    pub fn seed_demo(&self) -> StoreResult<ItemId> {
        let usd = |units: i64| procura_core::Money::from_major(units).map_err(StoreError::from);
        self.add_analyst_report(20.0, "demo: demand up 20 % on the assembly line")?;
        let item = self.add_item("Widget A", 5, 20, usd(9)?)?;
        for (name, email, lead_days, price, rating) in [
            ("Acme Components", "sales@acme.example", 5, 10, 4.0),
            ("Bolt Supply", "quotes@bolt.example", 7, 8, 3.0),
        ] {
            let vendor = self.add_vendor(name, email, true, lead_days)?;
            self.add_offer(VendorOffer {
                item_id: item,
                vendor_id: vendor,
                unit_price: usd(price)?,
                rating,
            })?;
        }
        Ok(item)
    }

    /// Snapshot of every RFQ, in id order.
    pub fn rfqs(&self) -> StoreResult<Vec<Rfq>> {
        Ok(self.read()?.rfqs.values().cloned().collect())
    }

    pub fn purchase_orders(&self) -> StoreResult<Vec<PurchaseOrder>> {
        Ok(self.read()?.orders.values().cloned().collect())
    }

    pub fn quote(&self, id: QuoteId) -> StoreResult<Option<Quote>> {
        Ok(self.read()?.quotes.get(&id).cloned())
    }
}

#[async_trait]
impl ProcurementStore for InMemoryProcurementStore {
    async fn inventory_count(&self) -> StoreResult<i64> {
        Ok(self.read()?.items.len() as i64)
    }

    async fn low_stock_items(&self) -> StoreResult<Vec<InventoryItem>> {
        Ok(self
            .read()?
            .items
            .values()
            .filter(|i| i.is_low_stock())
            .cloned()
            .collect())
    }

    async fn item(&self, id: ItemId) -> StoreResult<Option<InventoryItem>> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn approved_vendors(&self, item: ItemId) -> StoreResult<Vec<SourcingVendor>> {
        let state = self.read()?;
        let mut vendors: Vec<SourcingVendor> = state
            .offers
            .iter()
            .filter(|o| o.item_id == item)
            .filter_map(|o| {
                let vendor = state.vendors.get(&o.vendor_id)?;
                vendor.is_approved.then(|| SourcingVendor {
                    vendor_id: vendor.id,
                    name: vendor.name.clone(),
                    email: vendor.email.clone(),
                    lead_time_days: vendor.lead_time_days,
                    unit_price: o.unit_price,
                    rating: o.rating,
                })
            })
            .collect();
        SourcingVendor::sort_for_dispatch(&mut vendors);
        Ok(vendors)
    }

    async fn latest_analyst_report(&self) -> StoreResult<Option<AnalystReport>> {
        Ok(self.read()?.reports.last().cloned())
    }

    async fn insert_rfq(&self, rfq: NewRfq) -> StoreResult<Rfq> {
        rfq.validate()?;
        let mut state = self.write()?;
        if state.rfqs.values().any(|r| r.rfq_number == rfq.rfq_number) {
            return Err(StoreError::Conflict(format!("rfq number {} taken", rfq.rfq_number)));
        }
        if state.rfqs.values().any(|r| {
            r.item_id == rfq.item_id && r.vendor_id == rfq.vendor_id && r.status == RfqStatus::Pending
        }) {
            return Err(StoreError::Conflict(format!(
                "pending rfq exists for item {} vendor {}",
                rfq.item_id, rfq.vendor_id
            )));
        }
        let id = RfqId::new(state.next_id());
        let row = Rfq {
            id,
            round: rfq.round,
            item_id: rfq.item_id,
            vendor_id: rfq.vendor_id,
            rfq_number: rfq.rfq_number,
            required_qty: rfq.required_qty,
            status: RfqStatus::Pending,
            created_at: Utc::now(),
        };
        state.rfqs.insert(id, row.clone());
        Ok(row)
    }

    async fn rfq(&self, id: RfqId) -> StoreResult<Option<Rfq>> {
        Ok(self.read()?.rfqs.get(&id).cloned())
    }

    async fn pending_rfq(&self, item: ItemId, vendor: VendorId) -> StoreResult<Option<Rfq>> {
        Ok(self
            .read()?
            .rfqs
            .values()
            .find(|r| r.item_id == item && r.vendor_id == vendor && r.status == RfqStatus::Pending)
            .cloned())
    }

    async fn pending_rfqs_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Rfq>> {
        let state = self.read()?;
        let mut rfqs: Vec<Rfq> = state
            .rfqs
            .values()
            .filter(|r| r.status == RfqStatus::Pending && r.created_at <= cutoff)
            .cloned()
            .collect();
        rfqs.sort_by_key(|r| (r.created_at, r.id));
        Ok(rfqs)
    }

    async fn transition_rfq(&self, id: RfqId, guard: StatusGuard<RfqStatus>) -> StoreResult<bool> {
        let mut state = self.write()?;
        let Some(rfq) = state.rfqs.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("rfq {id}")));
        };
        if !guard.matches(rfq.status) {
            return Ok(false);
        }
        rfq.status = guard.to();
        Ok(true)
    }

    async fn latest_round(&self, item: ItemId) -> StoreResult<Option<RoundSummary>> {
        let state = self.read()?;
        let Some(newest) = state.rfqs.values().filter(|r| r.item_id == item).max_by_key(|r| r.id) else {
            return Ok(None);
        };
        let round = newest.round;
        let rfqs: Vec<Rfq> = state.rfqs.values().filter(|r| r.round == round).cloned().collect();
        let quotes: Vec<Quote> = state.round_quotes(round).cloned().collect();
        let selected = quotes.iter().find(|q| q.status == QuoteStatus::Selected).map(|q| q.id);
        let approval = selected.and_then(|q| state.latest_approval(q).cloned());
        let purchase_order = selected.and_then(|q| state.orders.values().find(|o| o.quote_id == q).cloned());
        let shipment = purchase_order.as_ref().and_then(|po| {
            state
                .shipments
                .values()
                .find(|s| s.po_number == po.po_number)
                .cloned()
        });
        Ok(Some(RoundSummary {
            round,
            item_id: item,
            rfqs,
            quotes,
            approval,
            purchase_order,
            shipment,
        }))
    }

    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote> {
        quote.validate()?;
        let mut state = self.write()?;
        let Some(rfq) = state.rfqs.get(&quote.rfq_id) else {
            return Err(StoreError::NotFound(format!("rfq {}", quote.rfq_id)));
        };
        let vendor_id = rfq.vendor_id;
        let id = QuoteId::new(state.next_id());
        let row = Quote {
            id,
            rfq_id: quote.rfq_id,
            vendor_id,
            price: quote.price,
            delivery_days: quote.delivery_days,
            validity_days: quote.validity_days,
            status: QuoteStatus::Received,
            received_at: Utc::now(),
        };
        state.quotes.insert(id, row.clone());
        Ok(row)
    }

    async fn received_quote(&self, rfq: RfqId) -> StoreResult<Option<Quote>> {
        Ok(self
            .read()?
            .quotes
            .values()
            .find(|q| q.rfq_id == rfq && q.status == QuoteStatus::Received)
            .cloned())
    }

    async fn quote_candidates(&self, round: RoundId) -> StoreResult<Vec<QuoteCandidate>> {
        let state = self.read()?;
        let candidates = state
            .round_quotes(round)
            .filter(|q| q.status == QuoteStatus::Received)
            .filter_map(|q| {
                let rfq = state.rfqs.get(&q.rfq_id)?;
                if rfq.status != RfqStatus::Quoted {
                    return None;
                }
                let vendor = state.vendors.get(&q.vendor_id)?;
                let rating = state
                    .offers
                    .iter()
                    .find(|o| o.item_id == rfq.item_id && o.vendor_id == q.vendor_id)
                    .map(|o| o.rating)
                    .unwrap_or(0.0);
                Some(QuoteCandidate {
                    quote_id: q.id,
                    rfq_id: q.rfq_id,
                    vendor_id: q.vendor_id,
                    vendor_name: vendor.name.clone(),
                    price: q.price,
                    delivery_days: q.delivery_days,
                    validity_days: q.validity_days,
                    rating,
                })
            })
            .collect();
        Ok(candidates)
    }

    async fn award_quote(&self, round: RoundId, winner: QuoteId) -> StoreResult<bool> {
        let mut state = self.write()?;
        let round_ids: Vec<QuoteId> = state.round_quotes(round).map(|q| q.id).collect();
        if !round_ids.contains(&winner) {
            return Err(StoreError::NotFound(format!("quote {winner} in round {round}")));
        }
        let already_awarded = round_ids
            .iter()
            .filter_map(|id| state.quotes.get(id))
            .any(|q| q.status == QuoteStatus::Selected);
        let winner_received = state
            .quotes
            .get(&winner)
            .is_some_and(|q| q.status == QuoteStatus::Received);
        if already_awarded || !winner_received {
            return Ok(false);
        }
        for id in round_ids {
            if let Some(quote) = state.quotes.get_mut(&id) {
                if quote.status != QuoteStatus::Received {
                    continue;
                }
                let next = if id == winner {
                    QuoteStatus::Selected
                } else {
                    QuoteStatus::Rejected
                };
                quote.status = StatusGuard::new(quote.status, next)?.to();
            }
        }
        Ok(true)
    }

    async fn quote_context(&self, quote: QuoteId) -> StoreResult<Option<QuoteContext>> {
        Ok(self.read()?.quote_context(quote))
    }

    async fn insert_approval(&self, approval: NewApproval) -> StoreResult<Approval> {
        let mut state = self.write()?;
        match state.quotes.get(&approval.quote_id) {
            None => return Err(StoreError::NotFound(format!("quote {}", approval.quote_id))),
            Some(q) if q.status != QuoteStatus::Selected => {
                return Err(StoreError::Invalid(format!(
                    "quote {} is {}, approvals require a selected quote",
                    q.id, q.status
                )));
            }
            Some(_) => {}
        }
        if state.approvals.values().any(|a| a.quote_id == approval.quote_id) {
            return Err(StoreError::Conflict(format!(
                "quote {} already has an approval",
                approval.quote_id
            )));
        }
        let id = ApprovalId::new(state.next_id());
        let row = Approval {
            id,
            quote_id: approval.quote_id,
            approver: approval.approver,
            status: ApprovalStatus::Pending,
            requested_at: Utc::now(),
            decided_at: None,
            decided_by: None,
        };
        state.approvals.insert(id, row.clone());
        Ok(row)
    }

    async fn approval(&self, id: ApprovalId) -> StoreResult<Option<Approval>> {
        Ok(self.read()?.approvals.get(&id).cloned())
    }

    async fn latest_approval(&self, quote: QuoteId) -> StoreResult<Option<Approval>> {
        Ok(self.read()?.latest_approval(quote).cloned())
    }

    async fn decide_approval(
        &self,
        id: ApprovalId,
        guard: StatusGuard<ApprovalStatus>,
        decided_by: &str,
    ) -> StoreResult<bool> {
        let mut state = self.write()?;
        let Some(approval) = state.approvals.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("approval {id}")));
        };
        if !guard.matches(approval.status) {
            return Ok(false);
        }
        approval.status = guard.to();
        approval.decided_at = Some(Utc::now());
        approval.decided_by = Some(decided_by.to_string());
        Ok(true)
    }

    async fn pending_approvals(&self) -> StoreResult<Vec<Approval>> {
        Ok(self
            .read()?
            .approvals
            .values()
            .filter(|a| a.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn purchase_order_for_quote(&self, quote: QuoteId) -> StoreResult<Option<PurchaseOrder>> {
        Ok(self
            .read()?
            .orders
            .values()
            .find(|o| o.quote_id == quote)
            .cloned())
    }

    async fn insert_purchase_order(&self, order: NewPurchaseOrder) -> StoreResult<PurchaseOrder> {
        let mut state = self.write()?;
        if !state.quotes.contains_key(&order.quote_id) {
            return Err(StoreError::NotFound(format!("quote {}", order.quote_id)));
        }
        if state.orders.values().any(|o| o.quote_id == order.quote_id) {
            return Err(StoreError::Conflict(format!(
                "quote {} already has a purchase order",
                order.quote_id
            )));
        }
        if state.orders.values().any(|o| o.po_number == order.po_number) {
            return Err(StoreError::Conflict(format!("po number {} taken", order.po_number)));
        }
        let id = PurchaseOrderId::new(state.next_id());
        let row = PurchaseOrder {
            id,
            quote_id: order.quote_id,
            po_number: order.po_number,
            amount: order.amount,
            expected_delivery: order.expected_delivery,
            status: PurchaseOrderStatus::Issued,
            created_at: Utc::now(),
        };
        state.orders.insert(id, row.clone());
        Ok(row)
    }

    async fn order_context(&self, po_number: &str) -> StoreResult<Option<OrderContext>> {
        let state = self.read()?;
        let Some(order) = state.orders.values().find(|o| o.po_number == po_number) else {
            return Ok(None);
        };
        let Some(quote) = state.quote_context(order.quote_id) else {
            return Err(StoreError::Corrupt(format!("po {po_number} references a missing quote")));
        };
        Ok(Some(OrderContext {
            order: order.clone(),
            item_id: quote.item_id,
            item_name: quote.item_name,
            required_qty: quote.required_qty,
            vendor_id: quote.vendor_id,
            vendor_name: quote.vendor_name,
            delivery_days: quote.delivery_days,
            unit_price: quote.price,
        }))
    }

    async fn shipment_for_po(&self, po_number: &str) -> StoreResult<Option<Shipment>> {
        Ok(self
            .read()?
            .shipments
            .values()
            .find(|s| s.po_number == po_number)
            .cloned())
    }

    async fn insert_shipment(&self, shipment: NewShipment) -> StoreResult<Shipment> {
        let mut state = self.write()?;
        if state.shipments.values().any(|s| s.po_number == shipment.po_number) {
            return Err(StoreError::Conflict(format!(
                "po {} already has a shipment",
                shipment.po_number
            )));
        }
        let id = ShipmentId::new(state.next_id());
        let row = Shipment {
            id,
            po_number: shipment.po_number,
            expected_arrival: shipment.expected_arrival,
            status: ShipmentStatus::InTransit,
            quantity: shipment.quantity,
            carrier: shipment.carrier,
        };
        state.shipments.insert(id, row.clone());
        Ok(row)
    }

    async fn shipment(&self, id: ShipmentId) -> StoreResult<Option<Shipment>> {
        Ok(self.read()?.shipments.get(&id).cloned())
    }

    async fn transition_shipment(
        &self,
        id: ShipmentId,
        guard: StatusGuard<ShipmentStatus>,
    ) -> StoreResult<bool> {
        let mut state = self.write()?;
        let Some(shipment) = state.shipments.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("shipment {id}")));
        };
        if !guard.matches(shipment.status) {
            return Ok(false);
        }
        shipment.status = guard.to();
        Ok(true)
    }

    async fn append_decision(&self, decision: NewDecision) -> StoreResult<DecisionRecord> {
        let mut state = self.write()?;
        let id = DecisionId::new(state.next_id());
        let row = DecisionRecord {
            id,
            agent_name: decision.agent_name,
            summary: decision.summary,
            confidence: decision.confidence,
            human_approved: decision.human_approved,
            created_at: Utc::now(),
        };
        state.decisions.push(row.clone());
        Ok(row)
    }

    async fn recent_decisions(&self, limit: usize) -> StoreResult<Vec<DecisionRecord>> {
        Ok(self
            .read()?
            .decisions
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn begin_intent(&self, intent: NewIntent) -> StoreResult<Option<SagaIntent>> {
        let mut state = self.write()?;
        let held = state.intents.iter().any(|i| {
            i.kind == intent.kind && i.key == intent.key && i.status == IntentStatus::Attempting
        });
        if held {
            return Ok(None);
        }
        let now = Utc::now();
        let row = SagaIntent {
            id: IntentId::new(),
            kind: intent.kind,
            key: intent.key,
            legs: intent.legs,
            payload: intent.payload,
            status: IntentStatus::Attempting,
            note: None,
            created_at: now,
            updated_at: now,
        };
        state.intents.push(row.clone());
        Ok(Some(row))
    }

    async fn latest_intent(&self, kind: IntentKind, key: &str) -> StoreResult<Option<SagaIntent>> {
        Ok(self
            .read()?
            .intents
            .iter()
            .rev()
            .find(|i| i.kind == kind && i.key == key)
            .cloned())
    }

    async fn record_intent_leg(&self, id: IntentId, leg: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        let Some(intent) = state.intents.iter_mut().find(|i| i.id == id) else {
            return Err(StoreError::NotFound(format!("intent {id}")));
        };
        if !intent.has_leg(leg) {
            intent.legs.push(leg.to_string());
        }
        intent.updated_at = Utc::now();
        Ok(())
    }

    async fn close_intent(
        &self,
        id: IntentId,
        guard: StatusGuard<IntentStatus>,
        note: Option<String>,
    ) -> StoreResult<bool> {
        let mut state = self.write()?;
        let Some(intent) = state.intents.iter_mut().find(|i| i.id == id) else {
            return Err(StoreError::NotFound(format!("intent {id}")));
        };
        if !guard.matches(intent.status) {
            return Ok(false);
        }
        intent.status = guard.to();
        intent.note = note;
        intent.updated_at = Utc::now();
        Ok(true)
    }

    async fn stale_intents(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SagaIntent>> {
        Ok(self
            .read()?
            .intents
            .iter()
            .filter(|i| i.status == IntentStatus::Attempting && i.updated_at <= cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::{Money, StateMachine};

    fn usd(units: i64) -> Money {
        Money::from_major(units).unwrap()
    }

    fn seeded() -> (InMemoryProcurementStore, ItemId, VendorId, VendorId) {
        let store = InMemoryProcurementStore::new();
        let item = store.add_item("Widget", 5, 20, usd(10)).unwrap();
        let v1 = store.add_vendor("Acme", "acme@example.com", true, 5).unwrap();
        let v2 = store.add_vendor("Bolt", "bolt@example.com", true, 7).unwrap();
        store
            .add_offer(VendorOffer {
                item_id: item,
                vendor_id: v1,
                unit_price: usd(10),
                rating: 4.0,
            })
            .unwrap();
        store
            .add_offer(VendorOffer {
                item_id: item,
                vendor_id: v2,
                unit_price: usd(8),
                rating: 3.0,
            })
            .unwrap();
        (store, item, v1, v2)
    }

    fn new_rfq(round: RoundId, item: ItemId, vendor: VendorId, number: &str) -> NewRfq {
        NewRfq {
            round,
            item_id: item,
            vendor_id: vendor,
            rfq_number: number.to_string(),
            required_qty: 19,
        }
    }

    #[tokio::test]
    async fn approved_vendors_are_sorted_by_rating_then_id() {
        let (store, item, v1, v2) = seeded();
        let unapproved = store.add_vendor("Shady", "x@example.com", false, 1).unwrap();
        store
            .add_offer(VendorOffer {
                item_id: item,
                vendor_id: unapproved,
                unit_price: usd(1),
                rating: 5.0,
            })
            .unwrap();

        let vendors = store.approved_vendors(item).await.unwrap();
        let ids: Vec<_> = vendors.iter().map(|v| v.vendor_id).collect();
        assert_eq!(ids, vec![v1, v2]);
    }

    #[tokio::test]
    async fn second_pending_rfq_for_pair_conflicts() {
        let (store, item, v1, _) = seeded();
        let round = RoundId::new();
        store.insert_rfq(new_rfq(round, item, v1, "RFQ-1")).await.unwrap();

        let err = store.insert_rfq(new_rfq(round, item, v1, "RFQ-2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn guarded_rfq_transition_is_a_noop_once_moved() {
        let (store, item, v1, _) = seeded();
        let rfq = store.insert_rfq(new_rfq(RoundId::new(), item, v1, "RFQ-1")).await.unwrap();
        let guard = StatusGuard::new(RfqStatus::Pending, RfqStatus::Quoted).unwrap();

        assert!(store.transition_rfq(rfq.id, guard).await.unwrap());
        assert!(!store.transition_rfq(rfq.id, guard).await.unwrap());
        assert_eq!(store.rfq(rfq.id).await.unwrap().unwrap().status, RfqStatus::Quoted);
    }

    #[tokio::test]
    async fn award_is_exclusive_within_a_round() {
        let (store, item, v1, v2) = seeded();
        let round = RoundId::new();
        let guard = StatusGuard::new(RfqStatus::Pending, RfqStatus::Quoted).unwrap();
        let r1 = store.insert_rfq(new_rfq(round, item, v1, "RFQ-1")).await.unwrap();
        let r2 = store.insert_rfq(new_rfq(round, item, v2, "RFQ-2")).await.unwrap();
        let mut quotes = Vec::new();
        for (rfq, price) in [(&r1, 10), (&r2, 8)] {
            quotes.push(
                store
                    .insert_quote(NewQuote {
                        rfq_id: rfq.id,
                        price: usd(price),
                        delivery_days: 5,
                        validity_days: 30,
                    })
                    .await
                    .unwrap(),
            );
            store.transition_rfq(rfq.id, guard).await.unwrap();
        }

        assert!(store.award_quote(round, quotes[1].id).await.unwrap());
        assert!(!store.award_quote(round, quotes[0].id).await.unwrap());
        assert_eq!(store.quote(quotes[0].id).unwrap().unwrap().status, QuoteStatus::Rejected);
        assert_eq!(store.quote(quotes[1].id).unwrap().unwrap().status, QuoteStatus::Selected);

        let summary = store.latest_round(item).await.unwrap().unwrap();
        assert_eq!(summary.selected_quote().map(|q| q.id), Some(quotes[1].id));
    }

    #[tokio::test]
    async fn approvals_require_a_selected_quote() {
        let (store, item, v1, _) = seeded();
        let rfq = store.insert_rfq(new_rfq(RoundId::new(), item, v1, "RFQ-1")).await.unwrap();
        let quote = store
            .insert_quote(NewQuote {
                rfq_id: rfq.id,
                price: usd(10),
                delivery_days: 5,
                validity_days: 30,
            })
            .await
            .unwrap();

        let err = store
            .insert_approval(NewApproval {
                quote_id: quote.id,
                approver: "manager@company.com".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn second_approval_for_a_quote_conflicts() {
        let (store, item, v1, _) = seeded();
        let round = RoundId::new();
        let rfq = store.insert_rfq(new_rfq(round, item, v1, "RFQ-1")).await.unwrap();
        let quote = store
            .insert_quote(NewQuote {
                rfq_id: rfq.id,
                price: usd(10),
                delivery_days: 5,
                validity_days: 30,
            })
            .await
            .unwrap();
        assert!(store.award_quote(round, quote.id).await.unwrap());
        let request = || NewApproval {
            quote_id: quote.id,
            approver: "manager@company.com".into(),
        };

        store.insert_approval(request()).await.unwrap();
        let err = store.insert_approval(request()).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.pending_approvals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn guarded_shipment_transition_is_a_noop_once_moved() {
        let store = InMemoryProcurementStore::new();
        let shipment = store
            .insert_shipment(NewShipment {
                po_number: "PO-1".into(),
                expected_arrival: Utc::now(),
                quantity: 19,
                carrier: None,
            })
            .await
            .unwrap();
        let delivered =
            StatusGuard::new(ShipmentStatus::InTransit, ShipmentStatus::Delivered).unwrap();

        assert!(store.transition_shipment(shipment.id, delivered).await.unwrap());
        assert!(!store.transition_shipment(shipment.id, delivered).await.unwrap());
        let stored = store.shipment(shipment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ShipmentStatus::Delivered);
        assert!(matches!(
            store.transition_shipment(ShipmentId::new(999), delivered).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn one_attempting_intent_per_key() {
        let store = InMemoryProcurementStore::new();
        let first = store
            .begin_intent(NewIntent::new(IntentKind::RfqDispatch, "1:2"))
            .await
            .unwrap()
            .unwrap();
        assert!(store
            .begin_intent(NewIntent::new(IntentKind::RfqDispatch, "1:2"))
            .await
            .unwrap()
            .is_none());

        let done = StatusGuard::new(IntentStatus::Attempting, IntentStatus::Completed).unwrap();
        assert!(store.close_intent(first.id, done, None).await.unwrap());
        assert!(store
            .begin_intent(NewIntent::new(IntentKind::RfqDispatch, "1:2"))
            .await
            .unwrap()
            .is_some());
        assert!(IntentStatus::Completed.is_terminal());
    }

    #[tokio::test]
    async fn demo_seed_needs_sourcing() {
        let store = InMemoryProcurementStore::new();
        let item = store.seed_demo().unwrap();

        let low = store.low_stock_items().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, item);
        assert_eq!(store.approved_vendors(item).await.unwrap().len(), 2);
        assert!(store.latest_analyst_report().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn outage_surfaces_as_unavailable() {
        let (store, _, _, _) = seeded();
        store.set_unavailable(true);
        assert!(matches!(
            store.low_stock_items().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert_eq!(store.low_stock_items().await.unwrap().len(), 1);
    }
}
