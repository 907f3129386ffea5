//! # Money Module
//!
//! Ticket prices and sale totals are integer cents. There is no float
//! constructor; the database stores the same `i64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::CoreError;

/// A monetary value in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use encore_core::money::Money;
    ///
    /// let price = Money::from_cents(4500);
    /// assert_eq!(price.cents(), 4500);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Whole currency units (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Fractional cents part (always non-negative).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Price of `quantity` tickets at this unit price.
    ///
    /// Returns an error instead of wrapping when the product overflows.
    ///
    /// ```rust
    /// use encore_core::money::Money;
    ///
    /// let total = Money::from_cents(4500).times(3).unwrap();
    /// assert_eq!(total.cents(), 13500);
    /// ```
    pub fn times(&self, quantity: i64) -> Result<Money, CoreError> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| CoreError::AmountOverflow {
                context: format!("{} x {}", self, quantity),
            })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}
