//! Quote ranking.
//!
//! Selection is price-only: the lowest price wins and ties break on the lowest quote id.
//! Each candidate also gets an advisory weighted score (price 40, delivery 30,
//! rating 30) for the human-facing comparison. The score never affects selection.

use serde::{Deserialize, Serialize};

use procura_core::QuoteId;

use crate::inventory::VendorOffer;
use crate::quote::QuoteCandidate;

pub const PRICE_WEIGHT: f64 = 0.40;
pub const DELIVERY_WEIGHT: f64 = 0.30;
pub const RATING_WEIGHT: f64 = 0.30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryScore {
    pub quote_id: QuoteId,
    pub price_score: f64,
    pub delivery_score: f64,
    pub rating_score: f64,
    /// 0 ..= 100
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub winner: QuoteCandidate,
    pub rejected: Vec<QuoteId>,
    pub scores: Vec<AdvisoryScore>,
}

impl Ranking {
    pub fn score_of(&self, quote_id: QuoteId) -> Option<&AdvisoryScore> {
        self.scores.iter().find(|s| s.quote_id == quote_id)
    }
}

/// Rank a round's RECEIVED quotes. `None` when there is nothing to rank.
pub fn rank_quotes(candidates: &[QuoteCandidate]) -> Option<Ranking> {
    let winner = candidates
        .iter()
        .min_by(|a, b| a.price.cmp(&b.price).then_with(|| a.quote_id.cmp(&b.quote_id)))?
        .clone();

    let mut rejected: Vec<QuoteId> = candidates
        .iter()
        .map(|c| c.quote_id)
        .filter(|id| *id != winner.quote_id)
        .collect();
    rejected.sort();
    rejected.dedup();

    Some(Ranking {
        scores: advisory_scores(candidates),
        winner,
        rejected,
    })
}

/// Scores normalized within the round: best price / delivery earn 1.0.
pub fn advisory_scores(candidates: &[QuoteCandidate]) -> Vec<AdvisoryScore> {
    let min_price = candidates.iter().map(|c| c.price.cents()).min().unwrap_or(0);
    let min_delivery = candidates.iter().map(|c| c.delivery_days.max(0)).min().unwrap_or(0);

    let mut scores: Vec<AdvisoryScore> = candidates
        .iter()
        .map(|c| {
            let price_score = ratio(min_price as f64, c.price.cents() as f64);
            let delivery_score = ratio(f64::from(min_delivery), f64::from(c.delivery_days.max(0)));
            let rating_score = (c.rating / VendorOffer::MAX_RATING).clamp(0.0, 1.0);
            let total = (100.0
                * (PRICE_WEIGHT * price_score
                    + DELIVERY_WEIGHT * delivery_score
                    + RATING_WEIGHT * rating_score))
                .clamp(0.0, 100.0);
            AdvisoryScore {
                quote_id: c.quote_id,
                price_score,
                delivery_score,
                rating_score,
                total,
            }
        })
        .collect();
    scores.sort_by_key(|s| s.quote_id);
    scores
}

/// `best / value`, where a zero value is itself the best possible.
fn ratio(best: f64, value: f64) -> f64 {
    if value <= 0.0 { 1.0 } else { (best / value).clamp(0.0, 1.0) }
}
