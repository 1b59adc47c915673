//! Value objects: equality by value, not identity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one, build a
/// new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A non-negative monetary amount in minor units (cents).
///
/// Prices and purchase-order amounts are exact integers so that
/// `amount = quantity × unit price` never rounds. On the wire the value is a decimal
/// number of major units (`152.0`), rounded to the nearest cent when read.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    cents: i64,
}

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    pub fn from_cents(cents: i64) -> DomainResult<Self> {
        if cents < 0 {
            return Err(DomainError::validation("money amount must be non-negative"));
        }
        Ok(Self { cents })
    }

    /// Whole major units (dollars).
    pub fn from_major(units: i64) -> DomainResult<Self> {
        units
            .checked_mul(100)
            .ok_or_else(|| DomainError::validation("money amount overflows"))
            .and_then(Self::from_cents)
    }

    /// Decimal major units, rounded to the nearest cent.
    pub fn from_decimal(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("money amount must be finite"));
        }
        let cents = (value * 100.0).round();
        if cents > i64::MAX as f64 {
            return Err(DomainError::validation("money amount overflows"));
        }
        Self::from_cents(cents as i64)
    }

    pub const fn cents(self) -> i64 {
        self.cents
    }

    pub fn as_decimal(self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.cents == 0
    }

    /// Multiply by a quantity (`amount = qty × unit price`).
    pub fn times(self, quantity: i64) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity must be non-negative"));
        }
        self.cents
            .checked_mul(quantity)
            .ok_or_else(|| DomainError::invariant("money amount overflows"))
            .map(|cents| Self { cents })
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "${}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Money::from_decimal(value).map_err(serde::de::Error::custom)
    }
}
