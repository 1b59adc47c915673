use serde::Serialize;
use tracing::{info, instrument};

use procura_ai::Prompt;
use procura_core::{ApprovalId, QuoteId, StatusGuard};
use procura_purchasing::{
    Agent, Approval, ApprovalDecision, ApprovalStatus, NewApproval, NewDecision, QuoteContext,
    QuoteStatus,
};

use super::context::PipelineContext;
use super::error::{Stage, StageError, UnitFailure};
use super::events::{CycleEventDetail, CycleEvents};
use crate::saga::{IntentKind, IntentStatus, NewIntent};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// A new PENDING approval was created and the approver notified.
    Requested(Approval),
    AlreadyPending(Approval),
    AlreadyApproved(Approval),
    /// A human rejected the purchase; the round needs a fresh start.
    Declined(Approval),
    /// The quote is not SELECTED.
    NotSelected,
    /// Another cycle is requesting approval for the same quote right now.
    InProgress,
    Failed(UnitFailure),
}

impl ApprovalOutcome {
    fn existing(approval: Approval) -> Self {
        match approval.status {
            ApprovalStatus::Pending => Self::AlreadyPending(approval),
            ApprovalStatus::Approved => Self::AlreadyApproved(approval),
            ApprovalStatus::Rejected => Self::Declined(approval),
        }
    }
}

/// Requests human approval for selected quotes and records the decisions.
///
/// The gate never approves anything by itself.
pub struct ApprovalGate {
    ctx: PipelineContext,
    events: CycleEvents,
}

impl ApprovalGate {
    pub fn new(ctx: PipelineContext, events: CycleEvents) -> Self {
        Self { ctx, events }
    }

    #[instrument(skip(self, analysis))]
    pub async fn request(&self, quote_id: QuoteId, analysis: Option<&str>) -> ApprovalOutcome {
        let unit = format!("quote:{quote_id}");
        let failed = |err: StageError| {
            ApprovalOutcome::Failed(
                self.events
                    .failed(UnitFailure::new(Stage::Approval, unit.clone(), &err)),
            )
        };
        let store = &self.ctx.store;

        let quote = match self.ctx.read("quote_context", || store.quote_context(quote_id)).await {
            Ok(Some(quote)) if quote.status == QuoteStatus::Selected => quote,
            Ok(_) => return ApprovalOutcome::NotSelected,
            Err(err) => return failed(err.into()),
        };

        match self.ctx.read("latest_approval", || store.latest_approval(quote_id)).await {
            Ok(Some(existing)) => return ApprovalOutcome::existing(existing),
            Ok(None) => {}
            Err(err) => return failed(err.into()),
        }

        let intent = match store
            .begin_intent(NewIntent::new(IntentKind::ApprovalRequest, quote_id.to_string()))
            .await
        {
            Ok(Some(intent)) => intent,
            Ok(None) => return ApprovalOutcome::InProgress,
            Err(err) => return failed(err.into()),
        };

        // A concurrent request may have finished between the first read and the intent.
        match self.ctx.read("latest_approval", || store.latest_approval(quote_id)).await {
            Ok(Some(existing)) => {
                let note = Some("approval already requested".to_string());
                self.ctx
                    .close_intent(intent.id, IntentStatus::Completed, note)
                    .await;
                return ApprovalOutcome::existing(existing);
            }
            Ok(None) => {}
            Err(err) => {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err.into());
            }
        }

        let body = match self.compose(&quote, analysis).await {
            Ok(body) => body,
            Err(err) => {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err);
            }
        };

        let manager = self.ctx.settings.channels.manager.clone();
        let message = self.ctx.message(
            manager.clone(),
            format!("Purchase Approval Required - {}", quote.item_name),
            body,
        );
        if let Err(err) = self.ctx.send(&message).await {
            self.ctx
                .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                .await;
            return failed(err.into());
        }

        let approval = match store
            .insert_approval(NewApproval {
                quote_id,
                approver: manager.clone(),
            })
            .await
        {
            Ok(approval) => approval,
            Err(err) => {
                self.ctx
                    .close_intent(
                        intent.id,
                        IntentStatus::NeedsReview,
                        Some(format!("approver notified but approval not recorded: {err}")),
                    )
                    .await;
                let failure = UnitFailure::new(Stage::Approval, unit.clone(), &err.into())
                    .needs_manual_intervention();
                return ApprovalOutcome::Failed(self.events.failed(failure));
            }
        };

        self.ctx
            .close_intent(intent.id, IntentStatus::Completed, None)
            .await;
        self.ctx
            .ledger
            .record(NewDecision::new(
                Agent::Approval,
                format!(
                    "Requested approval from {manager} for {} x {} from {} at {} per unit",
                    quote.required_qty, quote.item_name, quote.vendor_name, quote.price
                ),
            ))
            .await;
        self.events.emit(CycleEventDetail::ApprovalRequested {
            quote_id,
            approval_id: approval.id,
        });
        info!(quote = %quote_id, approval = %approval.id, approver = %manager, "approval requested");
        ApprovalOutcome::Requested(approval)
    }

    async fn compose(&self, quote: &QuoteContext, analysis: Option<&str>) -> Result<String, StageError> {
        let prompt = Prompt::ApprovalRequest {
            item_name: quote.item_name.clone(),
            vendor_name: quote.vendor_name.clone(),
            quantity: quote.required_qty,
            unit_price: quote.price,
            total: quote.total()?,
            delivery_days: quote.delivery_days,
            analysis: analysis.map(str::to_string),
        };
        Ok(self.ctx.generate(&prompt).await?)
    }

    /// Record the external human decision on a PENDING approval.
    #[instrument(skip(self), err)]
    pub async fn decide(
        &self,
        approval_id: ApprovalId,
        decision: ApprovalDecision,
        decided_by: &str,
    ) -> Result<Approval, StoreError> {
        let decided_by = decided_by.trim();
        if decided_by.is_empty() {
            return Err(StoreError::Invalid("decided_by must not be empty".to_string()));
        }

        let store = &self.ctx.store;
        let current = store
            .approval(approval_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("approval {approval_id}")))?;
        let guard = StatusGuard::new(current.status, decision.target_status())?;
        if !store.decide_approval(approval_id, guard, decided_by).await? {
            return Err(StoreError::Conflict(format!(
                "approval {approval_id} was decided concurrently"
            )));
        }
        let decided = store
            .approval(approval_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("approval {approval_id}")))?;

        let verb = match decision {
            ApprovalDecision::Approve => "approved",
            ApprovalDecision::Reject => "rejected",
        };
        let mut record = NewDecision::new(
            Agent::ApprovalDecision,
            format!("{decided_by} {verb} the purchase of quote {}", decided.quote_id),
        );
        if decided.is_approved() {
            record = record.human_approved();
        }
        self.ctx.ledger.record(record).await;
        info!(approval = %approval_id, decided_by, decision = verb, "approval decided");
        Ok(decided)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::RankOutcome;
    use crate::pipeline::test_support::Harness;
    use crate::store::ProcurementStore;

    async fn selected(h: &Harness) -> QuoteId {
        let requirements = h.ctx.requirements().requirements().await.unwrap();
        h.ctx.dispatcher().dispatch(&requirements).await;
        h.reply_all().await;
        h.ctx.quote_intake().poll().await;
        match h.ctx.ranker().rank(h.item).await {
            RankOutcome::Selected(s) => s.quote_id,
            other => panic!("expected a selection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_creates_one_pending_approval_and_notifies_the_manager() {
        let h = Harness::scenario();
        let quote = selected(&h).await;

        let outcome = h.ctx.approval_gate().request(quote, Some("V2 is cheapest")).await;

        let ApprovalOutcome::Requested(approval) = outcome else {
            panic!("expected a new request, got {outcome:?}");
        };
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert_eq!(approval.approver, "manager@company.com");
        let mail = h.transport.sent_to("manager@company.com");
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].subject, "Purchase Approval Required - Widget A");

        let again = h.ctx.approval_gate().request(quote, None).await;
        assert!(matches!(again, ApprovalOutcome::AlreadyPending(a) if a.id == approval.id));
        assert_eq!(h.transport.sent_to("manager@company.com").len(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_create_one_approval() {
        let h = Harness::scenario_delayed(Duration::from_millis(50));
        let quote = selected(&h).await;
        let (g1, g2) = (h.ctx.approval_gate(), h.ctx.approval_gate());

        let (a, b) = tokio::join!(g1.request(quote, None), g2.request(quote, None));

        let requested: Vec<_> = [&a, &b]
            .into_iter()
            .filter_map(|o| match o {
                ApprovalOutcome::Requested(approval) => Some(approval.id),
                _ => None,
            })
            .collect();
        assert_eq!(requested.len(), 1, "outcomes: {a:?} / {b:?}");
        assert!(
            [&a, &b]
                .into_iter()
                .any(|o| matches!(o, ApprovalOutcome::AlreadyPending(p) if p.id == requested[0]))
        );
        assert_eq!(h.store.pending_approvals().await.unwrap().len(), 1);
        assert_eq!(h.transport.sent_to("manager@company.com").len(), 1);
    }

    #[tokio::test]
    async fn notification_failure_leaves_no_approval() {
        let h = Harness::scenario();
        let quote = selected(&h).await;
        h.transport.fail_recipient("manager@company.com");

        let outcome = h.ctx.approval_gate().request(quote, None).await;

        assert!(matches!(outcome, ApprovalOutcome::Failed(_)));
        assert_eq!(h.store.latest_approval(quote).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unselected_quote_is_not_sent_for_approval() {
        let h = Harness::scenario();
        let quote = selected(&h).await;
        let rejected = h
            .store
            .latest_round(h.item)
            .await
            .unwrap()
            .unwrap()
            .quotes
            .into_iter()
            .find(|q| q.id != quote)
            .unwrap();

        let outcome = h.ctx.approval_gate().request(rejected.id, None).await;

        assert_eq!(outcome, ApprovalOutcome::NotSelected);
    }

    #[tokio::test]
    async fn decisions_are_recorded_once() {
        let h = Harness::scenario();
        let quote = selected(&h).await;
        let gate = h.ctx.approval_gate();
        let ApprovalOutcome::Requested(approval) = gate.request(quote, None).await else {
            panic!("expected a new request");
        };

        let decided = gate
            .decide(approval.id, ApprovalDecision::Approve, "dana")
            .await
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
        assert_eq!(decided.decided_by.as_deref(), Some("dana"));
        let latest = h.ctx.ledger.recent(1).await.unwrap();
        assert!(latest[0].human_approved);

        let again = gate.decide(approval.id, ApprovalDecision::Reject, "dana").await;
        assert!(matches!(again, Err(StoreError::IllegalTransition(_))));
        assert!(matches!(
            gate.request(quote, None).await,
            ApprovalOutcome::AlreadyApproved(_)
        ));
    }

    #[tokio::test]
    async fn blank_decider_is_rejected() {
        let h = Harness::scenario();
        let err = h
            .ctx
            .approval_gate()
            .decide(ApprovalId::new(1), ApprovalDecision::Approve, "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }
}
