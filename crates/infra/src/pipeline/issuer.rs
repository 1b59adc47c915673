//! Purchase order issuance.
//!
//! Issuing touches three places: the vendor (PO document), finance (payment
//! authorization) and the store (the PO row). The row is written last, only after both
//! messages went out. The intent for a quote carries the PO number and terms plus the
//! legs already delivered, so a retry after a partial failure reuses the same number
//! and sends only what is missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use procura_ai::Prompt;
use procura_core::{Money, QuoteId};
use procura_purchasing::{
    Agent, ApprovalStatus, NewDecision, NewPurchaseOrder, OrderTerms, PurchaseOrder,
    PurchaseOrderDocument, QuoteContext, po_number,
};

use super::context::PipelineContext;
use super::error::{Stage, StageError, UnitFailure};
use super::events::{CycleEventDetail, CycleEvents};
use crate::saga::{IntentKind, IntentStatus, NewIntent, SagaIntent};
use crate::store::StoreError;

const VENDOR_LEG: &str = "vendor";
const FINANCE_LEG: &str = "finance";

/// What a partially issued order still lacks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLeg {
    PaymentAuthorization,
    Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IssueOutcome {
    Issued(PurchaseOrder),
    AlreadyIssued(PurchaseOrder),
    /// Latest approval status, `None` when approval was never requested.
    NotApproved { status: Option<ApprovalStatus> },
    InProgress,
    /// Nothing reached the vendor.
    Failed(UnitFailure),
    /// The vendor has the PO; `missing` has not happened yet.
    Partial {
        po_number: String,
        missing: MissingLeg,
        failure: UnitFailure,
    },
}

/// Persisted in the intent so retries reuse the same number and terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IssuePlan {
    po_number: String,
    amount: Money,
    expected_delivery: DateTime<Utc>,
    issued_at: DateTime<Utc>,
}

impl IssuePlan {
    fn fresh(quote: &QuoteContext, now: DateTime<Utc>) -> Result<Self, StageError> {
        let terms = OrderTerms::for_quote(quote, now)?;
        Ok(Self {
            po_number: po_number(now, quote.item_id),
            amount: terms.amount,
            expected_delivery: terms.expected_delivery,
            issued_at: now,
        })
    }

    fn terms(&self) -> OrderTerms {
        OrderTerms {
            amount: self.amount,
            expected_delivery: self.expected_delivery,
        }
    }
}

/// Turns approved quotes into purchase orders.
pub struct PurchaseOrderIssuer {
    ctx: PipelineContext,
    events: CycleEvents,
}

impl PurchaseOrderIssuer {
    pub fn new(ctx: PipelineContext, events: CycleEvents) -> Self {
        Self { ctx, events }
    }

    #[instrument(skip(self))]
    pub async fn issue(&self, quote_id: QuoteId) -> IssueOutcome {
        let unit = format!("quote:{quote_id}");
        let failed = |err: StageError| {
            IssueOutcome::Failed(
                self.events
                    .failed(UnitFailure::new(Stage::PurchaseOrder, unit.clone(), &err)),
            )
        };
        let store = &self.ctx.store;

        match self
            .ctx
            .read("purchase_order_for_quote", || store.purchase_order_for_quote(quote_id))
            .await
        {
            Ok(Some(order)) => return IssueOutcome::AlreadyIssued(order),
            Ok(None) => {}
            Err(err) => return failed(err.into()),
        }

        let approval = match self.ctx.read("latest_approval", || store.latest_approval(quote_id)).await {
            Ok(Some(approval)) if approval.is_approved() => approval,
            Ok(other) => {
                let status = other.map(|a| a.status);
                info!(quote = %quote_id, status = ?status, "purchase order blocked on approval");
                return IssueOutcome::NotApproved { status };
            }
            Err(err) => return failed(err.into()),
        };

        let quote = match self.ctx.read("quote_context", || store.quote_context(quote_id)).await {
            Ok(Some(quote)) => quote,
            Ok(None) => return failed(StoreError::NotFound(format!("quote {quote_id}")).into()),
            Err(err) => return failed(err.into()),
        };

        let key = quote_id.to_string();
        let previous = match store.latest_intent(IntentKind::PurchaseOrderIssue, &key).await {
            Ok(previous) => previous,
            Err(err) => return failed(err.into()),
        };
        if previous
            .as_ref()
            .is_some_and(|p| p.status == IntentStatus::Attempting)
        {
            return IssueOutcome::InProgress;
        }
        let (plan, legs) = match resume(previous.as_ref()) {
            Some(resumed) => resumed,
            None => match IssuePlan::fresh(&quote, Utc::now()) {
                Ok(plan) => (plan, Vec::new()),
                Err(err) => return failed(err),
            },
        };
        let payload = match serde_json::to_value(&plan) {
            Ok(payload) => payload,
            Err(err) => return failed(StoreError::Invalid(err.to_string()).into()),
        };

        let intent = NewIntent::new(IntentKind::PurchaseOrderIssue, key)
            .with_payload(payload)
            .with_legs(legs.clone());
        let intent = match store.begin_intent(intent).await {
            Ok(Some(intent)) => intent,
            Ok(None) => return IssueOutcome::InProgress,
            Err(err) => return failed(err.into()),
        };

        // A concurrent issue may have committed between the first read and the intent.
        match self
            .ctx
            .read("purchase_order_for_quote", || store.purchase_order_for_quote(quote_id))
            .await
        {
            Ok(Some(order)) => {
                let note = Some(format!("{} already issued", order.po_number));
                self.ctx
                    .close_intent(intent.id, IntentStatus::Completed, note)
                    .await;
                return IssueOutcome::AlreadyIssued(order);
            }
            Ok(None) => {}
            Err(err) => {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err.into());
            }
        }

        if !legs.iter().any(|l| l == VENDOR_LEG) {
            let document = PurchaseOrderDocument {
                po_number: &plan.po_number,
                issued_at: plan.issued_at,
                quote: &quote,
                terms: plan.terms(),
            };
            let message = self.ctx.message(
                quote.vendor_email.clone(),
                document.subject(),
                document.to_string(),
            );
            if let Err(err) = self.ctx.send(&message).await {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err.into());
            }
            self.ctx.record_leg(intent.id, VENDOR_LEG).await;
        }

        if !legs.iter().any(|l| l == FINANCE_LEG) {
            if let Err(err) = self.authorize_payment(&plan, &quote).await {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return self.partial(quote_id, &plan, MissingLeg::PaymentAuthorization, &unit, err);
            }
            self.ctx.record_leg(intent.id, FINANCE_LEG).await;
        }

        let order = match store
            .insert_purchase_order(NewPurchaseOrder {
                quote_id,
                po_number: plan.po_number.clone(),
                amount: plan.amount,
                expected_delivery: plan.expected_delivery,
            })
            .await
        {
            Ok(order) => order,
            Err(err) => {
                if let Ok(Some(existing)) = store.purchase_order_for_quote(quote_id).await {
                    warn!(quote = %quote_id, po = %existing.po_number, "order recorded by another cycle");
                    self.ctx
                        .close_intent(intent.id, IntentStatus::Completed, None)
                        .await;
                    return IssueOutcome::AlreadyIssued(existing);
                }
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return self.partial(quote_id, &plan, MissingLeg::Record, &unit, err.into());
            }
        };

        self.ctx
            .close_intent(intent.id, IntentStatus::Completed, None)
            .await;
        let approver = approval.decided_by.as_deref().unwrap_or(approval.approver.as_str());
        self.ctx
            .ledger
            .record(
                NewDecision::new(
                    Agent::PoFinalization,
                    format!(
                        "Issued {} to {} for {} x {} totalling {} (approved by {approver})",
                        order.po_number,
                        quote.vendor_name,
                        quote.required_qty,
                        quote.item_name,
                        order.amount
                    ),
                )
                .human_approved(),
            )
            .await;
        self.events.emit(CycleEventDetail::PurchaseOrderIssued {
            quote_id,
            po_number: order.po_number.clone(),
            amount: order.amount,
        });
        info!(quote = %quote_id, po = %order.po_number, amount = %order.amount, "purchase order issued");
        IssueOutcome::Issued(order)
    }

    async fn authorize_payment(&self, plan: &IssuePlan, quote: &QuoteContext) -> Result<(), StageError> {
        let prompt = Prompt::PaymentRequest {
            po_number: plan.po_number.clone(),
            vendor_name: quote.vendor_name.clone(),
            amount: plan.amount,
            payment_terms: quote.payment_terms.clone(),
        };
        let body = self.ctx.generate(&prompt).await?;
        let message = self.ctx.message(
            self.ctx.settings.channels.finance.clone(),
            format!("Payment Authorization Required - {}", plan.po_number),
            body,
        );
        self.ctx.send(&message).await?;
        Ok(())
    }

    fn partial(
        &self,
        quote_id: QuoteId,
        plan: &IssuePlan,
        missing: MissingLeg,
        unit: &str,
        err: StageError,
    ) -> IssueOutcome {
        let failure = self
            .events
            .failed(UnitFailure::new(Stage::PurchaseOrder, unit, &err));
        self.events.emit(CycleEventDetail::PurchaseOrderPartial {
            quote_id,
            po_number: plan.po_number.clone(),
            missing,
        });
        IssueOutcome::Partial {
            po_number: plan.po_number.clone(),
            missing,
            failure,
        }
    }
}

/// Plan and delivered legs of an earlier attempt that did not complete.
///
/// Only an attempt whose PO already reached the vendor is resumed; before that
/// nothing is committed and the retry plans afresh with the current date.
fn resume(previous: Option<&SagaIntent>) -> Option<(IssuePlan, Vec<String>)> {
    let previous = previous.filter(|p| {
        matches!(p.status, IntentStatus::Failed | IntentStatus::NeedsReview)
            && p.legs.iter().any(|l| l == VENDOR_LEG)
    })?;
    let plan = serde_json::from_value::<IssuePlan>(previous.payload.clone()).ok()?;
    Some((plan, previous.legs.clone()))
}
