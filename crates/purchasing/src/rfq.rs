//! Request for quotation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, ItemId, RfqId, RoundId, StateMachine, VendorId};

use crate::impl_status_display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfqStatus {
    Pending,
    Quoted,
}

impl StateMachine for RfqStatus {
    const ENTITY: &'static str = "rfq";
    const STATES: &'static [Self] = &[RfqStatus::Pending, RfqStatus::Quoted];

    fn as_str(self) -> &'static str {
        match self {
            RfqStatus::Pending => "PENDING",
            RfqStatus::Quoted => "QUOTED",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (RfqStatus::Pending, RfqStatus::Quoted))
    }
}

impl_status_display!(RfqStatus);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub round: RoundId,
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    pub rfq_number: String,
    pub required_qty: i64,
    pub status: RfqStatus,
    pub created_at: DateTime<Utc>,
}

/// An RFQ about to be persisted (always PENDING).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRfq {
    pub round: RoundId,
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    pub rfq_number: String,
    pub required_qty: i64,
}

impl NewRfq {
    pub fn validate(&self) -> DomainResult<()> {
        if self.required_qty <= 0 {
            return Err(DomainError::validation("rfq required_qty must be positive"));
        }
        if self.rfq_number.trim().is_empty() {
            return Err(DomainError::validation("rfq number cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_to_quoted_is_legal() {
        assert!(RfqStatus::Pending.can_transition_to(RfqStatus::Quoted));
        assert!(RfqStatus::Quoted.transition(RfqStatus::Pending).is_err());
        assert!(RfqStatus::Quoted.is_terminal());
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("QUOTED".parse::<RfqStatus>().unwrap(), RfqStatus::Quoted);
        assert_eq!(RfqStatus::Pending.to_string(), "PENDING");
        assert_eq!(serde_json::to_string(&RfqStatus::Pending).unwrap(), "\"PENDING\"");
    }

    #[test]
    fn new_rfq_requires_positive_quantity() {
        let rfq = NewRfq {
            round: RoundId::new(),
            item_id: ItemId::new(1),
            vendor_id: VendorId::new(1),
            rfq_number: "RFQ-1".into(),
            required_qty: 0,
        };
        assert!(matches!(rfq.validate(), Err(DomainError::Validation(_))));
    }
}
