//! Globally unique document numbers.
//!
//! Numbers embed a millisecond timestamp plus a process-wide sequence, so two numbers
//! minted in the same millisecond (e.g. RFQs to different vendors for one item) never
//! collide. The store enforces uniqueness independently.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use procura_core::{ItemId, VendorId};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S%3f").to_string()
}

/// `RFQ-{yyyymmddHHMMSSmmm}-{item}-{vendor}-{seq:04}`
pub fn rfq_number(at: DateTime<Utc>, item: ItemId, vendor: VendorId) -> String {
    format!("RFQ-{}-{item}-{vendor}-{:04}", stamp(at), next_sequence())
}

/// `PO-{yyyymmddHHMMSSmmm}-{item}-{seq:04}`
pub fn po_number(at: DateTime<Utc>, item: ItemId) -> String {
    format!("PO-{}-{item}-{:04}", stamp(at), next_sequence())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn same_millisecond_numbers_are_unique() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let numbers: HashSet<String> = (1..=50)
            .flat_map(|v| {
                [
                    rfq_number(at, ItemId::new(1), VendorId::new(v)),
                    rfq_number(at, ItemId::new(1), VendorId::new(1)),
                ]
            })
            .collect();
        assert_eq!(numbers.len(), 100);
    }

    #[test]
    fn formats_embed_timestamp_and_ids() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();
        let rfq = rfq_number(at, ItemId::new(7), VendorId::new(3));
        assert!(rfq.starts_with("RFQ-20260301093005000-7-3-"));
        let po = po_number(at, ItemId::new(7));
        assert!(po.starts_with("PO-20260301093005000-7-"));
    }
}
