//! Fixed-point currency and piece-type identifiers shared across services.
//!
//! Balances and prices are represented as integer cents so that saga
//! arithmetic (debit, credit, revert) never drifts under floating point
//! rounding, mirroring the teacher's `Px`/`Qty` fixed-point convention.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// A monetary amount stored as signed integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Construct from whole cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Construct from a decimal amount (e.g. `100.00`).
    #[must_use]
    pub fn from_decimal(amount: f64) -> Self {
        Self((amount * 100.0).round() as i64)
    }

    /// Integer cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Decimal value, for display and API payloads.
    #[must_use]
    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// True if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_decimal())
    }
}

/// The two piece types the catalog and warehouse know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceType {
    /// Piece type A.
    A,
    /// Piece type B.
    B,
}

impl PieceType {
    /// Lowercase token used in routing keys (`piece_a.requested`, ...).
    #[must_use]
    pub const fn routing_token(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_round_trip() {
        let m = Money::from_decimal(89.00);
        assert_eq!(m.cents(), 8900);
        assert_eq!(m.as_decimal(), 89.0);
        assert_eq!(m.to_string(), "89.00");
    }

    #[test]
    fn debit_then_credit_is_identity() {
        let balance = Money::from_decimal(100.00);
        let cost = Money::from_decimal(11.00);
        let debited = balance - cost;
        let restored = debited + cost;
        assert_eq!(restored, balance);
    }

    #[test]
    fn routing_tokens() {
        assert_eq!(PieceType::A.routing_token(), "a");
        assert_eq!(PieceType::B.routing_token(), "b");
    }
}
