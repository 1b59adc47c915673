use serde::Serialize;
use tracing::{info, instrument, warn};

use procura_ai::{Prompt, QuoteLine};
use procura_core::{ItemId, Money, QuoteId, RoundId, VendorId};
use procura_purchasing::{
    AdvisoryScore, Agent, NewDecision, QuoteCandidate, QuoteStatus, RoundSummary, rank_quotes,
};

use super::context::PipelineContext;
use super::error::{Stage, StageError, UnitFailure};
use super::events::{CycleEventDetail, CycleEvents};
use crate::store::StoreError;

/// The quote a round settled on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub item_id: ItemId,
    pub round: RoundId,
    pub quote_id: QuoteId,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub price: Money,
    pub delivery_days: i32,
    /// Generated comparison for humans; `None` when generation failed.
    pub analysis: Option<String>,
    /// Advisory only; empty for a selection made by an earlier cycle.
    pub scores: Vec<AdvisoryScore>,
    pub rejected: Vec<QuoteId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RankOutcome {
    Selected(Selection),
    AlreadySelected(Selection),
    NoQuotes,
    Failed(UnitFailure),
}

impl RankOutcome {
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            RankOutcome::Selected(s) | RankOutcome::AlreadySelected(s) => Some(s),
            RankOutcome::NoQuotes | RankOutcome::Failed(_) => None,
        }
    }
}

/// Picks the lowest-priced quote of an item's latest round.
pub struct QuoteRanker {
    ctx: PipelineContext,
    events: CycleEvents,
}

impl QuoteRanker {
    pub fn new(ctx: PipelineContext, events: CycleEvents) -> Self {
        Self { ctx, events }
    }

    #[instrument(skip(self))]
    pub async fn rank(&self, item: ItemId) -> RankOutcome {
        match self.try_rank(item).await {
            Ok(outcome) => outcome,
            Err(err) => RankOutcome::Failed(self.events.failed(UnitFailure::new(
                Stage::Ranking,
                format!("item:{item}"),
                &err,
            ))),
        }
    }

    async fn try_rank(&self, item: ItemId) -> Result<RankOutcome, StageError> {
        let store = &self.ctx.store;
        let Some(round) = self.ctx.read("latest_round", || store.latest_round(item)).await? else {
            return Ok(RankOutcome::NoQuotes);
        };
        if round.selected_quote().is_some() {
            return self.existing(&round).await;
        }

        let candidates = self
            .ctx
            .read("quote_candidates", || store.quote_candidates(round.round))
            .await?;
        let Some(ranking) = rank_quotes(&candidates) else {
            info!(item = %item, "no quotes to rank");
            return Ok(RankOutcome::NoQuotes);
        };
        let winner = &ranking.winner;

        if !store.award_quote(round.round, winner.quote_id).await? {
            // Another cycle awarded the round between our read and the write.
            let latest = self.ctx.read("latest_round", || store.latest_round(item)).await?;
            return match latest.filter(|r| r.round == round.round && r.selected_quote().is_some()) {
                Some(awarded) => self.existing(&awarded).await,
                None => Err(StoreError::Conflict(format!(
                    "round {} could not be awarded to quote {}",
                    round.round, winner.quote_id
                ))
                .into()),
            };
        }

        let item_name = match store.item(item).await {
            Ok(Some(row)) => row.name,
            _ => format!("item {item}"),
        };
        let analysis = self.narrate(&item_name, &candidates, &ranking.scores).await;

        self.ctx
            .ledger
            .record(NewDecision::new(
                Agent::QuoteAnalysis,
                format!(
                    "Selected {} for {} at {} per unit, {} days delivery ({} quotes compared)",
                    winner.vendor_name,
                    item_name,
                    winner.price,
                    winner.delivery_days,
                    candidates.len()
                ),
            ))
            .await;
        self.events.emit(CycleEventDetail::QuoteSelected {
            item_id: item,
            quote_id: winner.quote_id,
            vendor_id: winner.vendor_id,
            price: winner.price,
        });
        info!(
            item = %item,
            quote = %winner.quote_id,
            vendor = %winner.vendor_name,
            price = %winner.price,
            rejected = ranking.rejected.len(),
            "quote selected"
        );

        Ok(RankOutcome::Selected(Selection {
            item_id: item,
            round: round.round,
            quote_id: winner.quote_id,
            vendor_id: winner.vendor_id,
            vendor_name: winner.vendor_name.clone(),
            price: winner.price,
            delivery_days: winner.delivery_days,
            analysis,
            scores: ranking.scores.clone(),
            rejected: ranking.rejected.clone(),
        }))
    }

    async fn existing(&self, round: &RoundSummary) -> Result<RankOutcome, StageError> {
        let Some(selected) = round.selected_quote() else {
            return Ok(RankOutcome::NoQuotes);
        };
        let store = &self.ctx.store;
        let context = self
            .ctx
            .read("quote_context", || store.quote_context(selected.id))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("quote {}", selected.id)))?;

        Ok(RankOutcome::AlreadySelected(Selection {
            item_id: round.item_id,
            round: round.round,
            quote_id: selected.id,
            vendor_id: selected.vendor_id,
            vendor_name: context.vendor_name,
            price: selected.price,
            delivery_days: selected.delivery_days,
            analysis: None,
            scores: Vec::new(),
            rejected: round
                .quotes
                .iter()
                .filter(|q| q.status == QuoteStatus::Rejected)
                .map(|q| q.id)
                .collect(),
        }))
    }

    async fn narrate(
        &self,
        item_name: &str,
        candidates: &[QuoteCandidate],
        scores: &[AdvisoryScore],
    ) -> Option<String> {
        let quotes = candidates
            .iter()
            .map(|c| QuoteLine {
                vendor_name: c.vendor_name.clone(),
                price: c.price,
                delivery_days: c.delivery_days,
                rating: c.rating,
                score: scores
                    .iter()
                    .find(|s| s.quote_id == c.quote_id)
                    .map_or(0.0, |s| s.total),
            })
            .collect();
        let prompt = Prompt::QuoteAnalysis {
            item_name: item_name.to_string(),
            quotes,
        };
        match self.ctx.generate(&prompt).await {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(item = item_name, error = %err, "quote analysis unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::pipeline::test_support::{Harness, test_settings, usd};
    use crate::store::ProcurementStore;
    use procura_ai::{AiError, TextGenerator};

    async fn quoted(h: &Harness) {
        let requirements = h.ctx.requirements().requirements().await.unwrap();
        h.ctx.dispatcher().dispatch(&requirements).await;
        h.reply_all().await;
        h.ctx.quote_intake().poll().await;
    }

    #[tokio::test]
    async fn cheapest_quote_wins_regardless_of_rating() {
        let h = Harness::scenario();
        quoted(&h).await;

        let outcome = h.ctx.ranker().rank(h.item).await;

        let RankOutcome::Selected(selection) = outcome else {
            panic!("expected a selection, got {outcome:?}");
        };
        assert_eq!(selection.vendor_id, h.v2);
        assert_eq!(selection.price, usd(8));
        assert_eq!(selection.delivery_days, 7);
        assert_eq!(selection.rejected.len(), 1);
        assert!(selection.analysis.is_some());

        let winner = h.store.quote(selection.quote_id).unwrap().unwrap();
        let loser = h.store.quote(selection.rejected[0]).unwrap().unwrap();
        assert_eq!(winner.status, QuoteStatus::Selected);
        assert_eq!(loser.status, QuoteStatus::Rejected);
        assert_eq!(loser.vendor_id, h.v1);
    }

    #[tokio::test]
    async fn second_rank_returns_the_existing_selection() {
        let h = Harness::scenario();
        quoted(&h).await;
        let first = h.ctx.ranker().rank(h.item).await;

        let second = h.ctx.ranker().rank(h.item).await;

        let RankOutcome::AlreadySelected(again) = second else {
            panic!("expected the existing selection, got {second:?}");
        };
        assert_eq!(Some(again.quote_id), first.selection().map(|s| s.quote_id));
        assert_eq!(again.vendor_name, "V2");
    }

    #[tokio::test]
    async fn concurrent_ranks_award_the_round_once() {
        let h = Harness::scenario_delayed(Duration::from_millis(50));
        quoted(&h).await;
        let (r1, r2) = (h.ctx.ranker(), h.ctx.ranker());

        let (a, b) = tokio::join!(r1.rank(h.item), r2.rank(h.item));

        let fresh = [&a, &b]
            .into_iter()
            .filter(|o| matches!(o, RankOutcome::Selected(_)))
            .count();
        assert_eq!(fresh, 1, "outcomes: {a:?} / {b:?}");
        assert_eq!(
            a.selection().map(|s| s.quote_id),
            b.selection().map(|s| s.quote_id)
        );
        let round = h.store.latest_round(h.item).await.unwrap().unwrap();
        let selected = round
            .quotes
            .iter()
            .filter(|q| q.status == QuoteStatus::Selected)
            .count();
        assert_eq!(selected, 1);
    }

    #[tokio::test]
    async fn no_quoted_rfqs_means_no_quotes() {
        let h = Harness::scenario();
        let requirements = h.ctx.requirements().requirements().await.unwrap();
        h.ctx.dispatcher().dispatch(&requirements).await;

        assert_eq!(h.ctx.ranker().rank(h.item).await, RankOutcome::NoQuotes);
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        async fn generate(&self, _prompt: &Prompt) -> Result<String, AiError> {
            Err(AiError::Unavailable("model offline".into()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn narrative_failure_still_commits_the_selection() {
        let h = Harness::scenario();
        quoted(&h).await;
        let ctx = PipelineContext::new(
            h.store.clone(),
            Arc::new(Broken),
            h.transport.clone(),
            h.bus.clone(),
            test_settings(),
        );

        let outcome = ctx.ranker().rank(h.item).await;

        let RankOutcome::Selected(selection) = outcome else {
            panic!("expected a selection, got {outcome:?}");
        };
        assert_eq!(selection.analysis, None);
        assert_eq!(
            h.store.quote(selection.quote_id).unwrap().unwrap().status,
            QuoteStatus::Selected
        );
    }
}
