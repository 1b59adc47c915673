use serde::Deserialize;

use procura_core::{Money, RfqId};
use procura_purchasing::{ApprovalDecision, NewQuote, ShipmentStatus};

use crate::app::errors;

pub const DEFAULT_DECISION_LIMIT: usize = 20;
pub const MAX_DECISION_LIMIT: usize = 200;

/// A vendor's reply to an RFQ, entered on the vendor's behalf.
#[derive(Debug, Deserialize)]
pub struct RecordQuoteRequest {
    pub rfq_id: RfqId,
    /// Unit price in major currency units.
    pub price: f64,
    pub delivery_days: i32,
    #[serde(default = "default_validity_days")]
    pub validity_days: i32,
}

fn default_validity_days() -> i32 {
    30
}

impl RecordQuoteRequest {
    pub fn into_new_quote(self) -> Result<NewQuote, axum::response::Response> {
        let price = Money::from_decimal(self.price).map_err(|e| {
            errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                e.to_string(),
            )
        })?;
        Ok(NewQuote {
            rfq_id: self.rfq_id,
            price,
            delivery_days: self.delivery_days,
            validity_days: self.validity_days,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: ApprovalDecision,
    pub decided_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ShipmentStatusRequest {
    pub status: ShipmentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionsQuery {
    pub limit: Option<usize>,
}

impl DecisionsQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_DECISION_LIMIT)
            .clamp(1, MAX_DECISION_LIMIT)
    }
}
