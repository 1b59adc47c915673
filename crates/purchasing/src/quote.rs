//! Vendor quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{
    DomainError, DomainResult, ItemId, Money, QuoteId, RfqId, RoundId, StateMachine, VendorId,
};

use crate::impl_status_display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Received,
    Selected,
    Rejected,
}

impl StateMachine for QuoteStatus {
    const ENTITY: &'static str = "quote";
    const STATES: &'static [Self] = &[
        QuoteStatus::Received,
        QuoteStatus::Selected,
        QuoteStatus::Rejected,
    ];

    fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Received => "RECEIVED",
            QuoteStatus::Selected => "SELECTED",
            QuoteStatus::Rejected => "REJECTED",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (QuoteStatus::Received, QuoteStatus::Selected)
                | (QuoteStatus::Received, QuoteStatus::Rejected)
        )
    }
}

impl_status_display!(QuoteStatus);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub rfq_id: RfqId,
    pub vendor_id: VendorId,
    pub price: Money,
    pub delivery_days: i32,
    pub validity_days: i32,
    pub status: QuoteStatus,
    pub received_at: DateTime<Utc>,
}

/// A vendor response as it arrives. The vendor is taken from the RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    pub rfq_id: RfqId,
    pub price: Money,
    pub delivery_days: i32,
    pub validity_days: i32,
}

impl NewQuote {
    pub fn validate(&self) -> DomainResult<()> {
        if self.delivery_days < 0 {
            return Err(DomainError::validation("delivery_days cannot be negative"));
        }
        if self.validity_days < 0 {
            return Err(DomainError::validation("validity_days cannot be negative"));
        }
        Ok(())
    }
}

/// A RECEIVED quote competing in a round, joined with vendor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteCandidate {
    pub quote_id: QuoteId,
    pub rfq_id: RfqId,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub price: Money,
    pub delivery_days: i32,
    pub validity_days: i32,
    pub rating: f64,
}

/// Everything downstream stages need to know about a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteContext {
    pub quote_id: QuoteId,
    pub rfq_id: RfqId,
    pub round: RoundId,
    pub status: QuoteStatus,
    pub item_id: ItemId,
    pub item_name: String,
    pub required_qty: i64,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub vendor_email: String,
    pub payment_terms: String,
    pub price: Money,
    pub delivery_days: i32,
}

impl QuoteContext {
    /// `required_qty × price`.
    pub fn total(&self) -> DomainResult<Money> {
        self.price.times(self.required_qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decided_quotes_are_terminal() {
        assert!(QuoteStatus::Selected.is_terminal());
        assert!(QuoteStatus::Rejected.is_terminal());
        assert!(QuoteStatus::Selected.transition(QuoteStatus::Rejected).is_err());
        assert!(QuoteStatus::Received.transition(QuoteStatus::Selected).is_ok());
    }

    #[test]
    fn new_quote_rejects_negative_days() {
        let quote = NewQuote {
            rfq_id: RfqId::new(1),
            price: Money::from_major(8).unwrap(),
            delivery_days: -1,
            validity_days: 30,
        };
        assert!(quote.validate().is_err());
    }
}
