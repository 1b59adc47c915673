//! One procurement cycle: requirements through logistics.
//!
//! A cycle is resumable. Items whose latest round is still actionable are picked up
//! where the previous cycle left them (awaiting approval, partially issued, ...), so
//! re-running after a human approves is how an order gets issued.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};

use procura_core::{ApprovalId, CycleId, ItemId, Money, QuoteId, ShipmentId};
use procura_purchasing::ShipmentStatus;

use super::approval::{ApprovalGate, ApprovalOutcome};
use super::context::PipelineContext;
use super::dispatch::RfqDispatcher;
use super::error::UnitFailure;
use super::events::{CycleEventDetail, CycleEvents};
use super::issuer::{IssueOutcome, PurchaseOrderIssuer};
use super::logistics::{HandoffOutcome, LogisticsHandoff};
use super::quote_intake::QuoteIntake;
use super::ranking::{QuoteRanker, RankOutcome};
use super::requirement::RequirementIntake;

const STEP_REQUIREMENTS: u8 = 1;
const STEP_QUOTE_INTAKE: u8 = 2;
const STEP_QUOTES_OBSERVED: u8 = 3;
const STEP_RANKING: u8 = 4;
const STEP_APPROVAL: u8 = 5;
const STEP_PURCHASE_ORDER: u8 = 6;
const STEP_LOGISTICS: u8 = 7;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    NoAction,
    AwaitingQuotes,
    Partial,
    Completed,
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    AwaitingApproval,
    Declined,
    PartialIssue,
    Failed,
    NoQuotes,
}

/// How far one item got in this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub item_id: ItemId,
    pub status: ItemStatus,
    /// Furthest step reached (4 = ranking ... 7 = logistics).
    pub step: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<QuoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<ApprovalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<ShipmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logistics_status: Option<ShipmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ItemOutcome {
    fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            status: ItemStatus::NoQuotes,
            step: STEP_RANKING,
            quote_id: None,
            approval_id: None,
            po_number: None,
            amount: None,
            shipment_id: None,
            logistics_status: None,
            message: None,
        }
    }

    fn stop(mut self, status: ItemStatus, step: u8, message: impl Into<String>) -> Self {
        self.status = status;
        self.step = step;
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub cycle_id: CycleId,
    pub status: CycleStatus,
    pub rfqs_sent: usize,
    pub quotes_received: usize,
    /// The first item that reached purchase order issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logistics_status: Option<ShipmentStatus>,
    pub steps_completed: u8,
    pub items: Vec<ItemOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub failures: Vec<UnitFailure>,
}

impl CycleOutcome {
    fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            status: CycleStatus::Error,
            rfqs_sent: 0,
            quotes_received: 0,
            po_number: None,
            amount: None,
            logistics_status: None,
            steps_completed: 0,
            items: Vec::new(),
            message: None,
            failures: Vec::new(),
        }
    }
}

/// The stages of one cycle, sharing its event stream.
struct Stages {
    requirements: RequirementIntake,
    dispatcher: RfqDispatcher,
    quote_intake: QuoteIntake,
    ranker: QuoteRanker,
    gate: ApprovalGate,
    issuer: PurchaseOrderIssuer,
    logistics: LogisticsHandoff,
}

impl Stages {
    fn new(ctx: &PipelineContext, events: &CycleEvents) -> Self {
        Self {
            requirements: RequirementIntake::new(ctx.clone()),
            dispatcher: RfqDispatcher::new(ctx.clone(), events.clone()),
            quote_intake: QuoteIntake::new(ctx.clone(), events.clone()),
            ranker: QuoteRanker::new(ctx.clone(), events.clone()),
            gate: ApprovalGate::new(ctx.clone(), events.clone()),
            issuer: PurchaseOrderIssuer::new(ctx.clone(), events.clone()),
            logistics: LogisticsHandoff::new(ctx.clone(), events.clone()),
        }
    }
}

pub struct CycleOrchestrator {
    ctx: PipelineContext,
}

impl CycleOrchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Run one cycle. Never fails; problems are reported in the outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let events = self.ctx.events();
        let span = info_span!("cycle", cycle = %events.cycle_id());
        async {
            events.emit(CycleEventDetail::CycleStarted);
            let outcome = self.run(&events).await;
            events.emit(CycleEventDetail::CycleFinished {
                status: outcome.status,
                steps_completed: outcome.steps_completed,
            });
            info!(
                status = ?outcome.status,
                steps = outcome.steps_completed,
                rfqs_sent = outcome.rfqs_sent,
                quotes = outcome.quotes_received,
                failures = outcome.failures.len(),
                "cycle finished"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, events: &CycleEvents) -> CycleOutcome {
        let stages = Stages::new(&self.ctx, events);
        let store = &self.ctx.store;
        let mut outcome = CycleOutcome::new(events.cycle_id());

        match self.ctx.read("inventory_count", || store.inventory_count()).await {
            Ok(0) => return aborted(outcome, "no inventory items on file".to_string()),
            Ok(_) => {}
            Err(err) => return aborted(outcome, format!("inventory unavailable: {err}")),
        }
        let requirements = match stages.requirements.requirements().await {
            Ok(requirements) => requirements,
            Err(err) => return aborted(outcome, format!("low-stock query failed: {err}")),
        };

        let dispatch = stages.dispatcher.dispatch(&requirements).await;
        outcome.rfqs_sent = dispatch.sent;
        outcome.failures.extend(dispatch.failures);

        let mut active: BTreeSet<ItemId> = dispatch.dispatched_items.iter().copied().collect();
        for item in dispatch.in_flight {
            match self.ctx.read("latest_round", || store.latest_round(item)).await {
                Ok(Some(round)) if round.is_actionable() => {
                    active.insert(item);
                }
                Ok(_) => {}
                Err(err) => warn!(item = %item, error = %err, "round unreadable; item skipped"),
            }
        }
        if active.is_empty() {
            outcome.status = CycleStatus::NoAction;
            outcome.steps_completed = STEP_REQUIREMENTS;
            outcome.message = Some(if requirements.is_empty() {
                "No items need replenishment".to_string()
            } else {
                "No RFQs could be sent".to_string()
            });
            return outcome;
        }

        let intake = stages.quote_intake.poll().await;
        outcome.quotes_received = intake.received();
        outcome.failures.extend(intake.failures);

        let mut quoted = Vec::new();
        for item in active {
            match self.ctx.read("latest_round", || store.latest_round(item)).await {
                Ok(Some(round)) if round.phase().has_quotes() => quoted.push(item),
                Ok(_) => {}
                Err(err) => warn!(item = %item, error = %err, "round unreadable; item skipped"),
            }
        }
        if quoted.is_empty() {
            outcome.status = CycleStatus::AwaitingQuotes;
            outcome.steps_completed = STEP_QUOTE_INTAKE;
            outcome.message = Some(format!("{} RFQs sent; waiting for vendor quotes", outcome.rfqs_sent));
            return outcome;
        }

        for item in quoted {
            let (result, failure) = advance(&stages, item).await;
            outcome.failures.extend(failure);
            outcome.items.push(result);
        }

        if let Some(first) = outcome.items.iter().find(|i| i.po_number.is_some()) {
            outcome.po_number = first.po_number.clone();
            outcome.amount = first.amount;
            outcome.logistics_status = first.logistics_status;
        }
        let completed = outcome
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .count();
        if completed == outcome.items.len() {
            outcome.status = CycleStatus::Completed;
            outcome.steps_completed = STEP_LOGISTICS;
            outcome.message = Some(format!("{completed} purchase orders issued and handed to logistics"));
        } else {
            outcome.status = CycleStatus::Partial;
            outcome.steps_completed = outcome
                .items
                .iter()
                .map(|i| i.step)
                .max()
                .unwrap_or(STEP_QUOTES_OBSERVED)
                .max(STEP_QUOTES_OBSERVED);
            outcome.message = Some(format!(
                "{completed} of {} items completed",
                outcome.items.len()
            ));
        }
        outcome
    }
}

fn aborted(mut outcome: CycleOutcome, message: String) -> CycleOutcome {
    warn!(reason = %message, "cycle aborted");
    outcome.status = CycleStatus::Error;
    outcome.steps_completed = 0;
    outcome.message = Some(message);
    outcome
}

/// Rank, approve, issue and hand off one item as far as it will go.
async fn advance(stages: &Stages, item: ItemId) -> (ItemOutcome, Option<UnitFailure>) {
    let mut result = ItemOutcome::new(item);

    let selection = match stages.ranker.rank(item).await {
        RankOutcome::Selected(s) | RankOutcome::AlreadySelected(s) => s,
        RankOutcome::NoQuotes => {
            return (result.stop(ItemStatus::NoQuotes, STEP_RANKING, "no quotes to rank"), None);
        }
        RankOutcome::Failed(f) => {
            let message = f.error.clone();
            return (result.stop(ItemStatus::Failed, STEP_RANKING, message), Some(f));
        }
    };
    result.quote_id = Some(selection.quote_id);

    match stages
        .gate
        .request(selection.quote_id, selection.analysis.as_deref())
        .await
    {
        ApprovalOutcome::AlreadyApproved(approval) => result.approval_id = Some(approval.id),
        ApprovalOutcome::Requested(approval) | ApprovalOutcome::AlreadyPending(approval) => {
            result.approval_id = Some(approval.id);
            return (
                result.stop(ItemStatus::AwaitingApproval, STEP_APPROVAL, "awaiting human approval"),
                None,
            );
        }
        ApprovalOutcome::Declined(approval) => {
            result.approval_id = Some(approval.id);
            return (
                result.stop(ItemStatus::Declined, STEP_APPROVAL, "purchase was rejected by the approver"),
                None,
            );
        }
        ApprovalOutcome::InProgress => {
            return (
                result.stop(ItemStatus::AwaitingApproval, STEP_APPROVAL, "approval request in progress"),
                None,
            );
        }
        ApprovalOutcome::NotSelected => {
            return (
                result.stop(ItemStatus::Failed, STEP_APPROVAL, "quote is no longer selected"),
                None,
            );
        }
        ApprovalOutcome::Failed(f) => {
            let message = f.error.clone();
            return (result.stop(ItemStatus::Failed, STEP_APPROVAL, message), Some(f));
        }
    }

    let order = match stages.issuer.issue(selection.quote_id).await {
        IssueOutcome::Issued(order) | IssueOutcome::AlreadyIssued(order) => order,
        IssueOutcome::NotApproved { status } => {
            let message = format!("approval status {status:?}");
            return (result.stop(ItemStatus::AwaitingApproval, STEP_PURCHASE_ORDER, message), None);
        }
        IssueOutcome::InProgress => {
            return (
                result.stop(ItemStatus::Failed, STEP_PURCHASE_ORDER, "purchase order issue in progress"),
                None,
            );
        }
        IssueOutcome::Failed(f) => {
            let message = f.error.clone();
            return (result.stop(ItemStatus::Failed, STEP_PURCHASE_ORDER, message), Some(f));
        }
        IssueOutcome::Partial {
            po_number,
            missing,
            failure,
        } => {
            result.po_number = Some(po_number);
            let message = format!("purchase order partially issued; missing {missing:?}");
            return (
                result.stop(ItemStatus::PartialIssue, STEP_PURCHASE_ORDER, message),
                Some(failure),
            );
        }
    };
    result.po_number = Some(order.po_number.clone());
    result.amount = Some(order.amount);

    match stages.logistics.hand_off(&order.po_number).await {
        HandoffOutcome::Forwarded(shipment) | HandoffOutcome::AlreadyForwarded(shipment) => {
            result.shipment_id = Some(shipment.id);
            result.logistics_status = Some(shipment.status);
            result.status = ItemStatus::Completed;
            result.step = STEP_LOGISTICS;
            (result, None)
        }
        HandoffOutcome::InProgress => (
            result.stop(ItemStatus::Failed, STEP_LOGISTICS, "logistics handoff in progress"),
            None,
        ),
        HandoffOutcome::Failed(f) => {
            let message = f.error.clone();
            (result.stop(ItemStatus::Failed, STEP_LOGISTICS, message), Some(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{Harness, usd};
    use crate::store::ProcurementStore;
    use procura_purchasing::ApprovalDecision;

    #[tokio::test]
    async fn empty_inventory_is_an_error() {
        let h = Harness::empty();
        let outcome = CycleOrchestrator::new(h.ctx.clone()).run_cycle().await;
        assert_eq!(outcome.status, CycleStatus::Error);
        assert_eq!(outcome.steps_completed, 0);
    }

    #[tokio::test]
    async fn unreachable_store_is_an_error() {
        let h = Harness::scenario();
        h.store.set_unavailable(true);
        let outcome = CycleOrchestrator::new(h.ctx.clone()).run_cycle().await;
        assert_eq!(outcome.status, CycleStatus::Error);
    }

    #[tokio::test]
    async fn stocked_inventory_needs_no_action() {
        let h = Harness::empty();
        h.add_item("Bolt", 50, 20, 1);
        let outcome = CycleOrchestrator::new(h.ctx.clone()).run_cycle().await;
        assert_eq!(outcome.status, CycleStatus::NoAction);
        assert_eq!(outcome.steps_completed, 1);
        assert_eq!(outcome.rfqs_sent, 0);
    }

    #[tokio::test]
    async fn cycle_resumes_after_approval() {
        let h = Harness::scenario();
        let orchestrator = CycleOrchestrator::new(h.ctx.clone());

        let first = orchestrator.run_cycle().await;
        assert_eq!(first.status, CycleStatus::AwaitingQuotes);
        assert_eq!(first.rfqs_sent, 2);
        assert_eq!(first.steps_completed, 2);

        h.reply_all().await;
        let second = orchestrator.run_cycle().await;
        assert_eq!(second.status, CycleStatus::Partial);
        assert_eq!(second.rfqs_sent, 0);
        assert_eq!(second.quotes_received, 2);
        assert_eq!(second.items[0].status, ItemStatus::AwaitingApproval);
        assert_eq!(second.steps_completed, 5);
        assert_eq!(second.po_number, None);
        assert_ne!(first.cycle_id, second.cycle_id);

        let approval = h.store.pending_approvals().await.unwrap().remove(0);
        h.ctx
            .approval_gate()
            .decide(approval.id, ApprovalDecision::Approve, "dana")
            .await
            .unwrap();

        let third = orchestrator.run_cycle().await;
        assert_eq!(third.status, CycleStatus::Completed);
        assert_eq!(third.steps_completed, 7);
        assert_eq!(third.amount, Some(usd(152)));
        assert_eq!(third.logistics_status, Some(ShipmentStatus::InTransit));
        assert!(third.failures.is_empty());
    }

    #[tokio::test]
    async fn events_bracket_the_cycle() {
        let h = Harness::empty();
        h.add_item("Bolt", 50, 20, 1);
        let subscription = procura_events::EventBus::subscribe(&*h.bus);

        CycleOrchestrator::new(h.ctx.clone()).run_cycle().await;

        let names: Vec<&str> = subscription
            .drain()
            .iter()
            .map(|e| e.payload().detail.name())
            .collect();
        assert_eq!(names, vec!["cycle.started", "cycle.finished"]);
    }
}
