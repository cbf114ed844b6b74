//! Type-safe price representation using decimal arithmetic.
//!
//! Money is never represented as a float: unit prices, line totals and tax
//! amounts all go through [`rust_decimal::Decimal`], which serializes as a
//! string so persisted carts round-trip exactly.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store currency's standard unit
/// (e.g., dollars, not cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply the price by a quantity, for line totals.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Scale the price by a fractional rate, for tax surcharges.
    #[must_use]
    pub fn scaled_by(&self, rate: Decimal) -> Self {
        Self(self.0 * rate)
    }

    /// Whether the amount is negative. Catalog prices are expected to be
    /// zero or positive; this exists so callers can reject bad input.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative()
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        assert_eq!(Price::from_cents(1999).to_string(), "$19.99");
        assert_eq!(Price::from_cents(0), Price::ZERO);
    }

    #[test]
    fn test_times_is_exact() {
        let price = Price::new(Decimal::new(1099, 2)); // 10.99
        assert_eq!(price.times(3), Price::new(Decimal::new(3297, 2)));
    }

    #[test]
    fn test_sum() {
        let total: Price = [Price::from_cents(1000), Price::from_cents(550)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(1550));
    }

    #[test]
    fn test_serde_round_trips_as_string() {
        let price = Price::new(Decimal::new(2550, 2));
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"25.50\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }
}
