//! Purchase orders.
//!
//! A purchase order is immutable once issued. Its commercial terms are derived from the
//! selected quote alone:
//!
//! - `amount = required_qty × price`
//! - `expected_delivery = issued_at + delivery_days`

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{
    DomainError, DomainResult, ItemId, Money, PurchaseOrderId, QuoteId, StateMachine, VendorId,
};

use crate::impl_status_display;
use crate::quote::QuoteContext;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Issued,
}

impl StateMachine for PurchaseOrderStatus {
    const ENTITY: &'static str = "purchase_order";
    const STATES: &'static [Self] = &[PurchaseOrderStatus::Issued];

    fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Issued => "ISSUED",
        }
    }

    fn can_transition_to(self, _next: Self) -> bool {
        false
    }
}

impl_status_display!(PurchaseOrderStatus);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub quote_id: QuoteId,
    pub po_number: String,
    pub amount: Money,
    pub expected_delivery: DateTime<Utc>,
    pub status: PurchaseOrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseOrder {
    pub quote_id: QuoteId,
    pub po_number: String,
    pub amount: Money,
    pub expected_delivery: DateTime<Utc>,
}

/// Commercial terms of a purchase order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerms {
    pub amount: Money,
    pub expected_delivery: DateTime<Utc>,
}

impl OrderTerms {
    pub fn for_quote(quote: &QuoteContext, issued_at: DateTime<Utc>) -> DomainResult<Self> {
        if quote.required_qty <= 0 {
            return Err(DomainError::invariant("order quantity must be positive"));
        }
        if quote.delivery_days < 0 {
            return Err(DomainError::invariant("delivery_days cannot be negative"));
        }
        Ok(Self {
            amount: quote.total()?,
            expected_delivery: issued_at + Duration::days(i64::from(quote.delivery_days)),
        })
    }
}

/// The document sent to the vendor. Rendered from the quote without text generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderDocument<'a> {
    pub po_number: &'a str,
    pub issued_at: DateTime<Utc>,
    pub quote: &'a QuoteContext,
    pub terms: OrderTerms,
}

impl PurchaseOrderDocument<'_> {
    pub fn subject(&self) -> String {
        format!("Purchase Order {} - {}", self.po_number, self.quote.item_name)
    }
}

impl core::fmt::Display for PurchaseOrderDocument<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let q = self.quote;
        writeln!(f, "PURCHASE ORDER")?;
        writeln!(f)?;
        writeln!(f, "PO Number: {}", self.po_number)?;
        writeln!(f, "Date: {}", self.issued_at.format("%Y-%m-%d"))?;
        writeln!(f, "Vendor: {}", q.vendor_name)?;
        writeln!(f, "Vendor Email: {}", q.vendor_email)?;
        writeln!(f)?;
        writeln!(f, "Item Description: {}", q.item_name)?;
        writeln!(f, "Quantity: {}", q.required_qty)?;
        writeln!(f, "Unit Price: {}", q.price)?;
        writeln!(f, "Total Amount: {}", self.terms.amount)?;
        writeln!(f)?;
        writeln!(f, "Delivery Timeline: {} days", q.delivery_days)?;
        writeln!(f, "Payment Terms: {}", q.payment_terms)?;
        writeln!(
            f,
            "Expected Delivery Date: {}",
            self.terms.expected_delivery.format("%Y-%m-%d")
        )?;
        writeln!(f)?;
        writeln!(f, "Special Instructions:")?;
        writeln!(f, "- Quality inspection required upon delivery")?;
        writeln!(f, "- Please confirm receipt of this PO within 48 hours")?;
        writeln!(f, "- Any changes require written approval")?;
        writeln!(f)?;
        write!(f, "Thank you for your business.")
    }
}

/// An issued order joined with what logistics needs to track it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContext {
    pub order: PurchaseOrder,
    pub item_id: ItemId,
    pub item_name: String,
    pub required_qty: i64,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub delivery_days: i32,
    pub unit_price: Money,
}
