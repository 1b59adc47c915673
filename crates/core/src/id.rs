//! Strongly-typed identifiers used across the domain.
//!
//! Rows owned by the relational store carry integer keys (`BIGSERIAL`); identifiers
//! minted by the pipeline itself (rounds, cycles, saga intents) are UUIDv7.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! impl_row_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if value <= 0 {
                    return Err(DomainError::invalid_id(format!("{}: must be positive", $name)));
                }
                Ok(Self(value))
            }
        }
    };
}

macro_rules! impl_uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_row_id!(
    /// Inventory item (`inventory.item_id`).
    ItemId,
    "ItemId"
);
impl_row_id!(
    /// Vendor (`vendors.vendor_id`).
    VendorId,
    "VendorId"
);
impl_row_id!(RfqId, "RfqId");
impl_row_id!(QuoteId, "QuoteId");
impl_row_id!(ApprovalId, "ApprovalId");
impl_row_id!(PurchaseOrderId, "PurchaseOrderId");
impl_row_id!(ShipmentId, "ShipmentId");
impl_row_id!(DecisionId, "DecisionId");

impl_uuid_id!(
    /// Groups the RFQs dispatched for one item in one dispatch invocation.
    RoundId,
    "RoundId"
);
impl_uuid_id!(
    /// One execution of the procurement cycle.
    CycleId,
    "CycleId"
);
impl_uuid_id!(
    /// A persisted send-then-persist intent.
    IntentId,
    "IntentId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_parse_positive_integers() {
        assert_eq!("42".parse::<ItemId>().unwrap(), ItemId::new(42));
        assert_eq!(" 7 ".parse::<QuoteId>().unwrap().get(), 7);
    }

    #[test]
    fn row_ids_reject_zero_negative_and_garbage() {
        assert!(matches!("0".parse::<ItemId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("-3".parse::<VendorId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("abc".parse::<RfqId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn row_ids_serialize_transparently() {
        let json = serde_json::to_string(&ApprovalId::new(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn uuid_ids_are_distinct_and_round_trip() {
        let a = RoundId::new();
        let b = RoundId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<RoundId>().unwrap(), a);
        assert!("not-a-uuid".parse::<CycleId>().is_err());
    }
}
