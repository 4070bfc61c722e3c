//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored in the currency's standard unit (reais, not centavos)
//! and are guaranteed non-negative at construction time. The store sells in
//! a single currency, so no currency code travels with the amount.

use std::iter::Sum;
use std::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from an amount in centavos.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display, e.g. `R$ 49.90`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("R$ {:.2}", self.0)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        // Sum of non-negatives stays non-negative.
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    #[test]
    fn test_new_rejects_negative() {
        let amount = Decimal::from_f64(-1.0).unwrap();
        assert!(matches!(Price::new(amount), Err(PriceError::Negative(_))));
    }

    #[test]
    fn test_new_accepts_zero_and_positive() {
        assert!(Price::new(Decimal::ZERO).is_ok());
        assert!(Price::new(Decimal::new(4990, 2)).is_ok());
    }

    #[test]
    fn test_from_cents() {
        let price = Price::from_cents(4990);
        assert_eq!(price.to_string(), "49.90");
    }

    #[test]
    fn test_display() {
        let price = Price::from_cents(4990);
        assert_eq!(price.display(), "R$ 49.90");
    }

    #[test]
    fn test_sum() {
        let prices = vec![Price::from_cents(1000), Price::from_cents(2550)];
        let total: Price = prices.into_iter().sum();
        assert_eq!(total, Price::from_cents(3550));
    }

    #[test]
    fn test_serde_as_string() {
        // rust_decimal's serde-with-str keeps amounts exact on the wire.
        let price = Price::from_cents(4990);
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"49.90\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }
}
