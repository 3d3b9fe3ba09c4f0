//! Fixed-point money in minor currency units.
//!
//! All arithmetic in the checkout pipeline happens on integer minor units
//! (cents). Conversion from a major-unit decimal rounds to the nearest cent
//! once, at the catalog boundary, so totals never accumulate binary
//! floating-point drift across line items.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A non-negative amount of money in minor units (e.g. cents).
///
/// Serialized as the raw minor-unit integer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Convert a major-unit decimal (e.g. `12.50`) to minor units, rounding
    /// to the nearest cent.
    ///
    /// Rejects negative, non-finite, and out-of-range values.
    pub fn from_major(major: f64) -> Result<Self, DomainError> {
        if !major.is_finite() {
            return Err(DomainError::validation("price must be a finite number"));
        }
        if major < 0.0 {
            return Err(DomainError::validation("price must not be negative"));
        }
        let minor = (major * 100.0).round();
        if minor > u64::MAX as f64 {
            return Err(DomainError::validation("price out of range"));
        }
        Ok(Self(minor as u64))
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiply a unit price by a line quantity.
    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(u64::from(quantity)).map(Money)
    }
}

impl core::fmt::Display for Money {
    /// Formats as a major-unit decimal with two places, e.g. `12.50`.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_rounds_to_nearest_cent() {
        assert_eq!(Money::from_major(12.50).unwrap(), Money::from_minor(1250));
        assert_eq!(Money::from_major(0.005).unwrap(), Money::from_minor(1));
        assert_eq!(Money::from_major(0.004).unwrap(), Money::from_minor(0));
        assert_eq!(Money::from_major(19.99).unwrap(), Money::from_minor(1999));
    }

    #[test]
    fn from_major_rejects_negative_and_non_finite() {
        assert!(Money::from_major(-0.01).is_err());
        assert!(Money::from_major(f64::NAN).is_err());
        assert!(Money::from_major(f64::INFINITY).is_err());
    }

    #[test]
    fn checked_arithmetic() {
        let price = Money::from_minor(1250);
        assert_eq!(price.checked_mul(2), Some(Money::from_minor(2500)));
        assert_eq!(
            price.checked_add(Money::from_minor(50)),
            Some(Money::from_minor(1300))
        );
        assert_eq!(Money::from_minor(u64::MAX).checked_mul(2), None);
    }

    #[test]
    fn displays_as_major_units() {
        assert_eq!(Money::from_minor(2500).to_string(), "25.00");
        assert_eq!(Money::from_minor(1205).to_string(), "12.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }
}
