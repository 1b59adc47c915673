use chrono::{Duration as ChronoDuration, Utc};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, instrument};

use procura_core::{ItemId, Money, QuoteId, RfqId, StatusGuard, VendorId};
use procura_purchasing::{Rfq, RfqStatus};

use super::context::PipelineContext;
use super::error::{Stage, StageError, UnitFailure};
use super::events::{CycleEventDetail, CycleEvents};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedQuote {
    pub rfq_id: RfqId,
    pub rfq_number: String,
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    pub quote_id: QuoteId,
    pub price: Money,
    pub delivery_days: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntakeReport {
    /// PENDING RFQs old enough to be looked at.
    pub checked: usize,
    /// Sorted by RFQ id.
    pub quotes: Vec<ObservedQuote>,
    pub still_pending: Vec<RfqId>,
    /// RFQs another cycle moved to QUOTED first.
    pub lost_races: Vec<RfqId>,
    pub failures: Vec<UnitFailure>,
}

impl IntakeReport {
    pub fn received(&self) -> usize {
        self.quotes.len()
    }
}

enum PollResult {
    Quoted(ObservedQuote),
    Pending(RfqId),
    LostRace(RfqId),
    Failed(UnitFailure),
}

/// Marks PENDING RFQs as QUOTED once a vendor reply is on file.
pub struct QuoteIntake {
    ctx: PipelineContext,
    events: CycleEvents,
}

impl QuoteIntake {
    pub fn new(ctx: PipelineContext, events: CycleEvents) -> Self {
        Self { ctx, events }
    }

    #[instrument(skip(self))]
    pub async fn poll(&self) -> IntakeReport {
        let mut report = IntakeReport::default();
        let cooldown = ChronoDuration::from_std(self.ctx.settings.quote_cooldown)
            .unwrap_or(ChronoDuration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(cooldown)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let store = &self.ctx.store;
        let rfqs = match self
            .ctx
            .read("pending_rfqs_created_before", || {
                store.pending_rfqs_created_before(cutoff)
            })
            .await
        {
            Ok(rfqs) => rfqs,
            Err(err) => {
                report.failures.push(self.events.failed(UnitFailure::new(
                    Stage::QuoteIntake,
                    "pending_rfqs",
                    &err.into(),
                )));
                return report;
            }
        };
        report.checked = rfqs.len();

        let results: Vec<PollResult> = futures::stream::iter(rfqs)
            .map(|rfq| self.poll_one(rfq))
            .buffer_unordered(self.ctx.settings.max_concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                PollResult::Quoted(quote) => report.quotes.push(quote),
                PollResult::Pending(id) => report.still_pending.push(id),
                PollResult::LostRace(id) => report.lost_races.push(id),
                PollResult::Failed(failure) => report.failures.push(failure),
            }
        }
        report.quotes.sort_by_key(|q| q.rfq_id);
        report.still_pending.sort();
        report.lost_races.sort();

        info!(
            checked = report.checked,
            received = report.received(),
            pending = report.still_pending.len(),
            "quote intake finished"
        );
        report
    }

    async fn poll_one(&self, rfq: Rfq) -> PollResult {
        let unit = format!("rfq:{}", rfq.id);
        let failed = |err: StageError| {
            PollResult::Failed(
                self.events
                    .failed(UnitFailure::new(Stage::QuoteIntake, unit.clone(), &err)),
            )
        };

        let store = &self.ctx.store;
        let quote = match self.ctx.read("received_quote", || store.received_quote(rfq.id)).await {
            Ok(Some(quote)) => quote,
            Ok(None) => return PollResult::Pending(rfq.id),
            Err(err) => return failed(err.into()),
        };

        let guard = match StatusGuard::new(RfqStatus::Pending, RfqStatus::Quoted) {
            Ok(guard) => guard,
            Err(err) => return failed(err.into()),
        };
        match store.transition_rfq(rfq.id, guard).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(rfq = %rfq.id, "rfq already advanced by another cycle");
                return PollResult::LostRace(rfq.id);
            }
            Err(err) => return failed(err.into()),
        }

        self.events.emit(CycleEventDetail::QuoteObserved {
            rfq_id: rfq.id,
            quote_id: quote.id,
        });
        info!(rfq = %rfq.rfq_number, quote = %quote.id, price = %quote.price, "quote observed");
        PollResult::Quoted(ObservedQuote {
            rfq_id: rfq.id,
            rfq_number: rfq.rfq_number,
            item_id: rfq.item_id,
            vendor_id: rfq.vendor_id,
            quote_id: quote.id,
            price: quote.price,
            delivery_days: quote.delivery_days,
        })
    }
}
