use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use procura_ai::Prompt;
use procura_core::{ItemId, RfqId, RoundId, VendorId};
use procura_purchasing::{
    Agent, NewDecision, NewRfq, Requirement, RoundPhase, RoundSummary, SourcingVendor, rfq_number,
};

use super::context::PipelineContext;
use super::error::{Stage, StageError, UnitFailure};
use super::events::{CycleEventDetail, CycleEvents};
use crate::saga::{IntentKind, IntentStatus, NewIntent};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchedRfq {
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub rfq_id: RfqId,
    pub rfq_number: String,
    pub round: RoundId,
    pub required_qty: i64,
}

/// A unit that was deliberately not sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUnit {
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    /// Sorted by (item id, vendor id).
    pub rfqs: Vec<DispatchedRfq>,
    /// Items with at least one RFQ sent by this run.
    pub dispatched_items: Vec<ItemId>,
    /// Items whose latest round is still open; no new round was started for them.
    pub in_flight: Vec<ItemId>,
    pub no_vendors: Vec<ItemId>,
    pub skipped: Vec<SkippedUnit>,
    pub failures: Vec<UnitFailure>,
}

struct DispatchUnit {
    requirement: Requirement,
    vendor: SourcingVendor,
    round: RoundId,
}

enum UnitResult {
    Sent(DispatchedRfq),
    Skipped(SkippedUnit),
    Failed(UnitFailure),
}

/// Sends RFQs to every approved vendor of each required item.
pub struct RfqDispatcher {
    ctx: PipelineContext,
    events: CycleEvents,
}

impl RfqDispatcher {
    pub fn new(ctx: PipelineContext, events: CycleEvents) -> Self {
        Self { ctx, events }
    }

    #[instrument(skip_all, fields(requirements = requirements.len()))]
    pub async fn dispatch(&self, requirements: &[Requirement]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut units = Vec::new();

        for requirement in requirements {
            let item = requirement.item_id;
            let store = &self.ctx.store;

            let round = match self.ctx.read("latest_round", || store.latest_round(item)).await {
                Ok(round) => round,
                Err(err) => {
                    report.failures.push(self.events.failed(UnitFailure::new(
                        Stage::Dispatch,
                        format!("item:{item}"),
                        &err.into(),
                    )));
                    continue;
                }
            };

            let vendors = match self.ctx.read("approved_vendors", || store.approved_vendors(item)).await {
                Ok(vendors) => vendors,
                Err(err) => {
                    report.failures.push(self.events.failed(UnitFailure::new(
                        Stage::Dispatch,
                        format!("item:{item}"),
                        &err.into(),
                    )));
                    continue;
                }
            };

            let round_id = match round.as_ref().filter(|r| r.is_open()) {
                Some(open) => {
                    report.in_flight.push(item);
                    if open.phase() != RoundPhase::AwaitingQuotes {
                        continue;
                    }
                    // Top up a round whose first dispatch only partly went out.
                    open.round
                }
                None => {
                    if vendors.is_empty() {
                        info!(item = %item, "no approved vendors");
                        report.no_vendors.push(item);
                        continue;
                    }
                    RoundId::new()
                }
            };

            let open_round = round.as_ref().filter(|r| r.round == round_id);
            for vendor in vendors {
                if open_round.is_some_and(|r| already_solicited(r, vendor.vendor_id)) {
                    continue;
                }
                units.push(DispatchUnit {
                    requirement: requirement.clone(),
                    vendor,
                    round: round_id,
                });
            }
        }

        let results: Vec<UnitResult> = futures::stream::iter(units)
            .map(|unit| self.dispatch_unit(unit))
            .buffer_unordered(self.ctx.settings.max_concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                UnitResult::Sent(rfq) => report.rfqs.push(rfq),
                UnitResult::Skipped(skipped) => report.skipped.push(skipped),
                UnitResult::Failed(failure) => report.failures.push(failure),
            }
        }

        report.rfqs.sort_by_key(|r| (r.item_id, r.vendor_id));
        report.skipped.sort_by_key(|s| (s.item_id, s.vendor_id));
        report.sent = report.rfqs.len();
        report.dispatched_items = report.rfqs.iter().map(|r| r.item_id).collect();
        report.dispatched_items.dedup();
        report.in_flight.retain(|item| !report.dispatched_items.contains(item));

        info!(
            sent = report.sent,
            in_flight = report.in_flight.len(),
            no_vendors = report.no_vendors.len(),
            failures = report.failures.len(),
            "dispatch finished"
        );
        report
    }

    /// generate -> send -> persist, under an `RfqDispatch` intent.
    async fn dispatch_unit(&self, unit: DispatchUnit) -> UnitResult {
        let DispatchUnit {
            requirement,
            vendor,
            mut round,
        } = unit;
        let item = requirement.item_id;
        let vendor_id = vendor.vendor_id;
        let unit_name = format!("item:{item}/vendor:{vendor_id}");
        let skipped = |reason: &str| {
            UnitResult::Skipped(SkippedUnit {
                item_id: item,
                vendor_id,
                reason: reason.to_string(),
            })
        };
        let failed = |err: StageError| {
            UnitResult::Failed(
                self.events
                    .failed(UnitFailure::new(Stage::Dispatch, unit_name.clone(), &err)),
            )
        };

        match self.ctx.store.pending_rfq(item, vendor_id).await {
            Ok(Some(_)) => return skipped("a pending RFQ already exists"),
            Ok(None) => {}
            Err(err) => return failed(err.into()),
        }

        let intent = NewIntent::new(IntentKind::RfqDispatch, format!("{item}:{vendor_id}"))
            .with_payload(json!({ "round": round, "required_qty": requirement.required_qty }));
        let intent = match self.ctx.store.begin_intent(intent).await {
            Ok(Some(intent)) => intent,
            Ok(None) => return skipped("another dispatch is in progress"),
            Err(err) => return failed(err.into()),
        };

        // Another cycle may have sent to this vendor, or opened a round for the item,
        // since this unit was planned.
        let store = &self.ctx.store;
        let current = async {
            let pending = self.ctx.read("pending_rfq", || store.pending_rfq(item, vendor_id)).await?;
            let latest = self.ctx.read("latest_round", || store.latest_round(item)).await?;
            Ok::<_, StoreError>((pending, latest))
        };
        match current.await {
            Ok((Some(_), _)) => {
                let note = Some("a pending RFQ already exists".to_string());
                self.ctx
                    .close_intent(intent.id, IntentStatus::Completed, note)
                    .await;
                return skipped("a pending RFQ already exists");
            }
            Ok((None, Some(latest))) if latest.is_open() && latest.round != round => {
                if latest.phase() != RoundPhase::AwaitingQuotes {
                    let note = Some(format!("round {} is already past quoting", latest.round));
                    self.ctx
                        .close_intent(intent.id, IntentStatus::Completed, note)
                        .await;
                    return skipped("another round is already in progress");
                }
                round = latest.round;
            }
            Ok(_) => {}
            Err(err) => {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err.into());
            }
        }

        let number = rfq_number(Utc::now(), item, vendor_id);
        let prompt = Prompt::RfqRequest {
            rfq_number: number.clone(),
            vendor_name: vendor.name.clone(),
            vendor_email: vendor.email.clone(),
            item_name: requirement.item_name.clone(),
            quantity: requirement.required_qty,
        };
        let body = match self.ctx.generate(&prompt).await {
            Ok(body) => body,
            Err(err) => {
                self.ctx
                    .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                    .await;
                return failed(err.into());
            }
        };

        let message = self.ctx.message(
            vendor.email.clone(),
            format!("Request for Quotation {number} - {}", requirement.item_name),
            body,
        );
        if let Err(err) = self.ctx.send(&message).await {
            self.ctx
                .close_intent(intent.id, IntentStatus::Failed, Some(err.to_string()))
                .await;
            return failed(err.into());
        }

        let rfq = match self
            .ctx
            .store
            .insert_rfq(NewRfq {
                round,
                item_id: item,
                vendor_id,
                rfq_number: number.clone(),
                required_qty: requirement.required_qty,
            })
            .await
        {
            Ok(rfq) => rfq,
            Err(err) => {
                self.ctx
                    .close_intent(
                        intent.id,
                        IntentStatus::NeedsReview,
                        Some(format!("RFQ {number} was sent but not recorded: {err}")),
                    )
                    .await;
                let failure = UnitFailure::new(Stage::Dispatch, unit_name.clone(), &err.into())
                    .needs_manual_intervention();
                return UnitResult::Failed(self.events.failed(failure));
            }
        };

        self.ctx
            .close_intent(intent.id, IntentStatus::Completed, None)
            .await;
        self.ctx
            .ledger
            .record(NewDecision::new(
                Agent::Rfq,
                format!(
                    "Sent RFQ {number} to {} for {} units of {}",
                    vendor.name, requirement.required_qty, requirement.item_name
                ),
            ))
            .await;
        self.events.emit(CycleEventDetail::RfqDispatched {
            item_id: item,
            vendor_id,
            rfq_number: number.clone(),
        });
        info!(item = %item, vendor = %vendor_id, rfq = %number, "rfq dispatched");

        UnitResult::Sent(DispatchedRfq {
            item_id: item,
            vendor_id,
            vendor_name: vendor.name,
            rfq_id: rfq.id,
            rfq_number: number,
            round,
            required_qty: requirement.required_qty,
        })
    }
}

fn already_solicited(round: &RoundSummary, vendor: VendorId) -> bool {
    round.rfqs.iter().any(|r| r.vendor_id == vendor)
}
