//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Matching and fee computation must produce identical results on replay, so
//! every numeric field in the engine goes through these types. Rounding is
//! HALF_UP to the trading pair's configured precision.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Price type with fixed-point decimal representation
///
/// Always strictly positive. Market orders carry no price at all
/// (`Option<Price>`), so the zero sentinel never appears.
/// Serialized as string to prevent JSON number precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a Price, returning None unless strictly positive.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from integer (tests and fixtures).
    ///
    /// # Panics
    /// Panics on zero.
    pub fn from_u64(value: u64) -> Self {
        Self::try_new(Decimal::from(value)).expect("price must be positive")
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Self::try_new(decimal).ok_or(rust_decimal::Error::ErrorString(
            "price must be positive".to_string(),
        ))
    }

    /// Get the inner decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Round to the given number of decimal places, HALF_UP.
    pub fn round_dp(&self, dp: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Whether this price is representable at the given precision,
    /// i.e. rounding to `dp` decimals does not change it.
    pub fn fits_precision(&self, dp: u32) -> bool {
        self.round_dp(dp).0 == self.0
    }

    /// Relative deviation |self − mark| / mark, as a non-negative decimal.
    pub fn deviation_from(&self, mark: Price) -> Decimal {
        let diff = (self.0 - mark.0).abs();
        diff / mark.0
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity type with fixed-point decimal representation
///
/// Non-negative; zero is a valid value (filled quantity of a fresh order,
/// remaining quantity of a filled one). Serialized as string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a Quantity, returning None if negative.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Zero quantity.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from integer (tests and fixtures).
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Self::try_new(decimal).ok_or(rust_decimal::Error::ErrorString(
            "quantity cannot be negative".to_string(),
        ))
    }

    /// Get the inner decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Round to the given number of decimal places, HALF_UP.
    pub fn round_dp(&self, dp: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Whether rounding to `dp` decimals changes the value.
    pub fn fits_precision(&self, dp: u32) -> bool {
        self.round_dp(dp).0 == self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Decimal::ZERO
    }

    /// The smaller of two quantities.
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(Decimal::ZERO)
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    /// # Panics
    /// Panics if the result would be negative; use `saturating_sub` when
    /// the caller cannot rule that out.
    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self.0 >= rhs.0, "quantity subtraction would go negative");
        Self(self.0 - rhs.0)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("quantity cannot be negative"))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quote-denominated value of a trade leg: quantity × price.
pub fn notional(quantity: Quantity, price: Price) -> Decimal {
    quantity.as_decimal() * price.as_decimal()
}
