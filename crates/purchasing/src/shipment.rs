//! Shipment tracking records handed to logistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{ShipmentId, StateMachine};

use crate::impl_status_display;
use crate::order::OrderContext;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    InTransit,
    Delayed,
    Delivered,
}

impl StateMachine for ShipmentStatus {
    const ENTITY: &'static str = "shipment";
    const STATES: &'static [Self] = &[
        ShipmentStatus::InTransit,
        ShipmentStatus::Delayed,
        ShipmentStatus::Delivered,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delayed => "DELAYED",
            ShipmentStatus::Delivered => "DELIVERED",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        use ShipmentStatus::*;
        matches!(
            (self, next),
            (InTransit, Delayed) | (InTransit, Delivered) | (Delayed, InTransit) | (Delayed, Delivered)
        )
    }
}

impl_status_display!(ShipmentStatus);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub po_number: String,
    pub expected_arrival: DateTime<Utc>,
    pub status: ShipmentStatus,
    pub quantity: i64,
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub po_number: String,
    pub expected_arrival: DateTime<Utc>,
    pub quantity: i64,
    pub carrier: Option<String>,
}

impl NewShipment {
    /// Arrival and quantity come from the order itself.
    pub fn for_order(ctx: &OrderContext) -> Self {
        Self {
            po_number: ctx.order.po_number.clone(),
            expected_arrival: ctx.order.expected_delivery,
            quantity: ctx.required_qty,
            carrier: None,
        }
    }
}
