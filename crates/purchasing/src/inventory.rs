//! Reference data the pipeline reads but never mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, ItemId, Money, VendorId};

/// A stocked item (`inventory`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub unit_price: Money,
}

impl InventoryItem {
    pub fn validate(&self) -> DomainResult<()> {
        if self.reorder_level <= 0 {
            return Err(DomainError::validation(format!(
                "item {}: reorder_level must be positive",
                self.id
            )));
        }
        Ok(())
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock < self.reorder_level
    }
}

/// A supplier (`vendors`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub email: String,
    pub is_approved: bool,
    pub lead_time_days: i32,
    pub payment_terms: String,
}

/// A vendor's standing offer for an item (`inventory_vendors`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorOffer {
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    pub unit_price: Money,
    /// 0.0 ..= 5.0
    pub rating: f64,
}

impl VendorOffer {
    pub const MAX_RATING: f64 = 5.0;

    pub fn validate(&self) -> DomainResult<()> {
        if !(0.0..=Self::MAX_RATING).contains(&self.rating) {
            return Err(DomainError::validation(format!(
                "vendor {} rating {} outside [0, 5]",
                self.vendor_id, self.rating
            )));
        }
        Ok(())
    }
}

/// An approved vendor joined with its offer for one item; the unit of RFQ fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingVendor {
    pub vendor_id: VendorId,
    pub name: String,
    pub email: String,
    pub lead_time_days: i32,
    pub unit_price: Money,
    pub rating: f64,
}

impl SourcingVendor {
    /// Rating descending, then vendor id ascending.
    pub fn sort_for_dispatch(vendors: &mut [SourcingVendor]) {
        vendors.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| a.vendor_id.cmp(&b.vendor_id))
        });
    }
}

/// Upstream analyst feed; only the latest row is consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystReport {
    pub trend_percent: f64,
    pub scrap_rate: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}
