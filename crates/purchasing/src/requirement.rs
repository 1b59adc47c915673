//! Reorder planning: how much to buy for each low-stock item.

use serde::{Deserialize, Serialize};

use procura_core::{ItemId, Money};

use crate::inventory::InventoryItem;

/// Production growth (percent) above which reorder thresholds are boosted.
pub const TREND_BOOST_THRESHOLD_PERCENT: f64 = 15.0;

/// Boost factor as an exact ratio (×1.2).
const BOOST_NUMERATOR: i64 = 6;
const BOOST_DENOMINATOR: i64 = 5;

/// A quantity that must be sourced for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub item_id: ItemId,
    pub item_name: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub adjusted_reorder: i64,
    pub required_qty: i64,
    pub unit_price: Money,
}

/// `floor(reorder_level × 1.2)` when the trend exceeds the threshold, else unchanged.
pub fn adjusted_reorder(reorder_level: i64, trend_percent: f64) -> i64 {
    if trend_percent > TREND_BOOST_THRESHOLD_PERCENT {
        reorder_level.saturating_mul(BOOST_NUMERATOR) / BOOST_DENOMINATOR
    } else {
        reorder_level
    }
}

/// Requirements for every item that still needs stock after adjustment, by item id.
pub fn plan_requirements(trend_percent: f64, items: &[InventoryItem]) -> Vec<Requirement> {
    let mut out: Vec<Requirement> = items
        .iter()
        .filter_map(|item| {
            let adjusted = adjusted_reorder(item.reorder_level, trend_percent);
            let required_qty = adjusted - item.current_stock;
            (required_qty > 0).then(|| Requirement {
                item_id: item.id,
                item_name: item.name.clone(),
                current_stock: item.current_stock,
                reorder_level: item.reorder_level,
                adjusted_reorder: adjusted,
                required_qty,
                unit_price: item.unit_price,
            })
        })
        .collect();
    out.sort_by_key(|r| r.item_id);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, stock: i64, reorder: i64) -> InventoryItem {
        InventoryItem {
            id: ItemId::new(id),
            name: format!("item-{id}"),
            current_stock: stock,
            reorder_level: reorder,
            unit_price: Money::from_major(1).unwrap(),
        }
    }

    #[test]
    fn boost_applies_only_above_threshold() {
        assert_eq!(adjusted_reorder(20, 20.0), 24);
        assert_eq!(adjusted_reorder(20, 15.0), 20);
        assert_eq!(adjusted_reorder(20, -30.0), 20);
        assert_eq!(adjusted_reorder(7, 16.0), 8);
    }

    #[test]
    fn required_quantity_is_gap_to_adjusted_level() {
        let reqs = plan_requirements(20.0, &[item(1, 5, 20)]);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].adjusted_reorder, 24);
        assert_eq!(reqs[0].required_qty, 19);
    }

    #[test]
    fn satisfied_items_are_dropped_and_output_is_sorted() {
        let reqs = plan_requirements(0.0, &[item(3, 1, 10), item(2, 10, 10), item(1, 0, 4)]);
        let ids: Vec<i64> = reqs.iter().map(|r| r.item_id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the boost is an exact floor of ×1.2 and never shrinks the level.
            #[test]
            fn boost_is_exact_floor(level in 1i64..1_000_000, trend in 15.0001f64..500.0) {
                let adjusted = adjusted_reorder(level, trend);
                prop_assert_eq!(adjusted, (level * 12) / 10);
                prop_assert!(adjusted >= level);
            }

            /// Property: every emitted requirement is positive and equals the gap.
            #[test]
            fn requirements_are_positive_gaps(
                rows in prop::collection::vec((0i64..200, 1i64..200), 0..30),
                trend in -50.0f64..50.0,
            ) {
                let items: Vec<InventoryItem> = rows
                    .iter()
                    .enumerate()
                    .map(|(i, (stock, reorder))| item(i as i64 + 1, *stock, *reorder))
                    .collect();
                let reqs = plan_requirements(trend, &items);
                for r in &reqs {
                    prop_assert!(r.required_qty > 0);
                    prop_assert_eq!(r.required_qty, adjusted_reorder(r.reorder_level, trend) - r.current_stock);
                }
                prop_assert!(reqs.windows(2).all(|w| w[0].item_id < w[1].item_id));
            }
        }
    }
}
