use serde::Serialize;
use tracing::{info, instrument};

use procura_ai::Prompt;
use procura_core::{ShipmentId, StatusGuard};
use procura_purchasing::{Agent, NewDecision, NewShipment, Shipment, ShipmentStatus};

use super::context::PipelineContext;
use super::error::{Stage, StageError, UnitFailure};
use super::events::{CycleEventDetail, CycleEvents};
use crate::saga::{IntentKind, IntentStatus, NewIntent};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandoffOutcome {
    Forwarded(Shipment),
    AlreadyForwarded(Shipment),
    InProgress,
    Failed(UnitFailure),
}

impl HandoffOutcome {
    pub fn shipment(&self) -> Option<&Shipment> {
        match self {
            HandoffOutcome::Forwarded(s) | HandoffOutcome::AlreadyForwarded(s) => Some(s),
            HandoffOutcome::InProgress | HandoffOutcome::Failed(_) => None,
        }
    }
}

/// Hands issued orders to logistics and schedules the inbound shipment.
pub struct LogisticsHandoff {
    ctx: PipelineContext,
    events: CycleEvents,
}

impl LogisticsHandoff {
    pub fn new(ctx: PipelineContext, events: CycleEvents) -> Self {
        Self { ctx, events }
    }

    #[instrument(skip(self))]
    pub async fn hand_off(&self, po_number: &str) -> HandoffOutcome {
        let unit = format!("po:{po_number}");
        let failed = |err: StageError| {
            HandoffOutcome::Failed(
                self.events
                    .failed(UnitFailure::new(Stage::Logistics, unit.clone(), &err)),
            )
        };
        let store = &self.ctx.store;

        match self.ctx.read("shipment_for_po", || store.shipment_for_po(po_number)).await {
            Ok(Some(shipment)) => return HandoffOutcome::AlreadyForwarded(shipment),
            Ok(None) => {}
            Err(err) => return failed(err.into()),
        }

        let order = match self.ctx.read("order_context", || store.order_context(po_number)).await {
            Ok(Some(order)) => order,
            Ok(None) => return failed(StoreError::NotFound(format!("purchase order {po_number}")).into()),
            Err(err) => return failed(err.into()),
        };

        let intent = match store
            .begin_intent(NewIntent::new(IntentKind::LogisticsHandoff, po_number))
            .await
        {
            Ok(Some(intent)) => intent,
            Ok(None) => return HandoffOutcome::InProgress,
            Err(err) => return failed(err.into()),
        };

        match self.ctx.read("shipment_for_po", || store.shipment_for_po(po_number)).await {
            Ok(Some(shipment)) => {
                let note = Some(format!("shipment {} already scheduled", shipment.id));
                self.ctx
                    .close_intent(intent.id, IntentStatus::Completed, note)
                    .await;
                return HandoffOutcome::AlreadyForwarded(shipment);
            }
            Ok(None) => {}
            Err(err) => {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err.into());
            }
        }

        let prompt = Prompt::LogisticsHandoff {
            po_number: po_number.to_string(),
            vendor_name: order.vendor_name.clone(),
            item_name: order.item_name.clone(),
            quantity: order.required_qty,
            amount: order.order.amount,
            expected_delivery: order.order.expected_delivery.date_naive(),
            delivery_days: order.delivery_days,
        };
        let sent = async {
            let body = self.ctx.generate(&prompt).await?;
            let message = self.ctx.message(
                self.ctx.settings.channels.logistics.clone(),
                format!("Logistics Handoff - {po_number}"),
                body,
            );
            self.ctx.send(&message).await?;
            Ok::<(), StageError>(())
        }
        .await;
        if let Err(err) = sent {
            self.ctx
                .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                .await;
            return failed(err);
        }

        let shipment = match store.insert_shipment(NewShipment::for_order(&order)).await {
            Ok(shipment) => shipment,
            Err(err) => {
                self.ctx
                    .close_intent(
                        intent.id,
                        IntentStatus::NeedsReview,
                        Some(format!("logistics notified but shipment not recorded: {err}")),
                    )
                    .await;
                let failure = UnitFailure::new(Stage::Logistics, unit.clone(), &err.into())
                    .needs_manual_intervention();
                return HandoffOutcome::Failed(self.events.failed(failure));
            }
        };

        self.ctx
            .close_intent(intent.id, IntentStatus::Completed, None)
            .await;
        self.ctx
            .ledger
            .record(NewDecision::new(
                Agent::LogisticsHandoff,
                format!(
                    "Handed {po_number} to logistics: {} x {} from {}, arriving {}",
                    shipment.quantity,
                    order.item_name,
                    order.vendor_name,
                    shipment.expected_arrival.format("%Y-%m-%d")
                ),
            ))
            .await;
        self.events.emit(CycleEventDetail::ShipmentScheduled {
            po_number: po_number.to_string(),
            shipment_id: shipment.id,
            expected_arrival: shipment.expected_arrival,
        });
        info!(po = po_number, shipment = %shipment.id, status = %shipment.status, "shipment scheduled");
        HandoffOutcome::Forwarded(shipment)
    }

    /// Record a carrier status update on a scheduled shipment.
    ///
    /// A DELIVERED shipment closes its round, so the item can be sourced again.
    #[instrument(skip(self), err)]
    pub async fn update_status(
        &self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    ) -> Result<Shipment, StoreError> {
        let store = &self.ctx.store;
        let current = store
            .shipment(shipment_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("shipment {shipment_id}")))?;
        let guard = StatusGuard::new(current.status, status)?;
        if !store.transition_shipment(shipment_id, guard).await? {
            return Err(StoreError::Conflict(format!(
                "shipment {shipment_id} was updated concurrently"
            )));
        }
        let updated = store
            .shipment(shipment_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("shipment {shipment_id}")))?;

        self.ctx
            .ledger
            .record(NewDecision::new(
                Agent::ShipmentTracking,
                format!(
                    "Shipment {shipment_id} for {} moved from {} to {}",
                    updated.po_number, current.status, updated.status
                ),
            ))
            .await;
        info!(shipment = %shipment_id, po = %updated.po_number, from = %current.status, to = %updated.status, "shipment status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::Harness;
    use crate::pipeline::{ApprovalOutcome, IssueOutcome, RankOutcome};
    use crate::store::ProcurementStore;
    use procura_purchasing::{ApprovalDecision, PurchaseOrder, RoundPhase};

    async fn issued(h: &Harness) -> PurchaseOrder {
        let requirements = h.ctx.requirements().requirements().await.unwrap();
        h.ctx.dispatcher().dispatch(&requirements).await;
        h.reply_all().await;
        h.ctx.quote_intake().poll().await;
        let RankOutcome::Selected(selection) = h.ctx.ranker().rank(h.item).await else {
            panic!("expected a selection");
        };
        let gate = h.ctx.approval_gate();
        let ApprovalOutcome::Requested(approval) = gate.request(selection.quote_id, None).await
        else {
            panic!("expected a new approval request");
        };
        gate.decide(approval.id, ApprovalDecision::Approve, "dana")
            .await
            .unwrap();
        match h.ctx.issuer().issue(selection.quote_id).await {
            IssueOutcome::Issued(order) => order,
            other => panic!("expected an issued order, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shipment_mirrors_the_order() {
        let h = Harness::scenario();
        let order = issued(&h).await;

        let outcome = h.ctx.logistics().hand_off(&order.po_number).await;

        let HandoffOutcome::Forwarded(shipment) = outcome else {
            panic!("expected a forwarded order, got {outcome:?}");
        };
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
        assert_eq!(shipment.quantity, 19);
        assert_eq!(shipment.expected_arrival, order.expected_delivery);
        let mail = h.transport.sent_to("logistics@company.com");
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].subject, format!("Logistics Handoff - {}", order.po_number));

        let again = h.ctx.logistics().hand_off(&order.po_number).await;
        assert_eq!(again, HandoffOutcome::AlreadyForwarded(shipment));
        assert_eq!(h.transport.sent_to("logistics@company.com").len(), 1);
    }

    #[tokio::test]
    async fn concurrent_handoffs_schedule_one_shipment() {
        let h = Harness::scenario_delayed(std::time::Duration::from_millis(50));
        let order = issued(&h).await;
        let (l1, l2) = (h.ctx.logistics(), h.ctx.logistics());

        let (a, b) = tokio::join!(l1.hand_off(&order.po_number), l2.hand_off(&order.po_number));

        let forwarded = [&a, &b]
            .into_iter()
            .filter(|o| matches!(o, HandoffOutcome::Forwarded(_)))
            .count();
        assert_eq!(forwarded, 1, "outcomes: {a:?} / {b:?}");
        assert_eq!(a.shipment(), b.shipment());
        assert_eq!(h.transport.sent_to("logistics@company.com").len(), 1);
    }

    #[tokio::test]
    async fn delivery_closes_the_round_and_the_item_is_sourced_again() {
        let h = Harness::scenario();
        let order = issued(&h).await;
        let HandoffOutcome::Forwarded(shipment) = h.ctx.logistics().hand_off(&order.po_number).await
        else {
            panic!("expected a forwarded order");
        };
        let logistics = h.ctx.logistics();

        let delayed = logistics
            .update_status(shipment.id, ShipmentStatus::Delayed)
            .await
            .unwrap();
        assert_eq!(delayed.status, ShipmentStatus::Delayed);
        let round = h.store.latest_round(h.item).await.unwrap().unwrap();
        assert_eq!(round.phase(), RoundPhase::Shipped);

        let delivered = logistics
            .update_status(shipment.id, ShipmentStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.status, ShipmentStatus::Delivered);
        let round = h.store.latest_round(h.item).await.unwrap().unwrap();
        assert_eq!(round.phase(), RoundPhase::Delivered);
        assert!(!round.is_open());
        let latest = h.ctx.ledger.recent(1).await.unwrap();
        assert!(latest[0].summary.contains("DELAYED to DELIVERED"));

        let requirements = h.ctx.requirements().requirements().await.unwrap();
        let report = h.ctx.dispatcher().dispatch(&requirements).await;
        assert_eq!(report.sent, 2);
        assert_ne!(report.rfqs[0].round, round.round);
    }

    #[tokio::test]
    async fn delivered_shipment_cannot_move_again() {
        let h = Harness::scenario();
        let order = issued(&h).await;
        let shipment = h
            .ctx
            .logistics()
            .hand_off(&order.po_number)
            .await
            .shipment()
            .cloned()
            .unwrap();
        let logistics = h.ctx.logistics();
        logistics
            .update_status(shipment.id, ShipmentStatus::Delivered)
            .await
            .unwrap();

        let err = logistics
            .update_status(shipment.id, ShipmentStatus::InTransit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition(_)));
        let missing = logistics
            .update_status(ShipmentId::new(999), ShipmentStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_notification_schedules_nothing() {
        let h = Harness::scenario();
        let order = issued(&h).await;
        h.transport.fail_recipient("logistics@company.com");

        let outcome = h.ctx.logistics().hand_off(&order.po_number).await;

        assert!(matches!(outcome, HandoffOutcome::Failed(_)));
        assert!(outcome.shipment().is_none());
    }

    #[tokio::test]
    async fn unknown_order_fails_the_unit() {
        let h = Harness::scenario();
        let outcome = h.ctx.logistics().hand_off("PO-missing").await;
        let HandoffOutcome::Failed(failure) = outcome else {
            panic!("expected a failure, got {outcome:?}");
        };
        assert_eq!(failure.unit, "po:PO-missing");
    }
}
