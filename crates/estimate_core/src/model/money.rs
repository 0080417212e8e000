//! Fixed-point money type for estimate cost arithmetic.
//!
//! # Responsibility
//! - Represent every monetary amount as whole cents in an `i64`.
//! - Keep cost splitting exact: repeated additions never drift.
//!
//! # Invariants
//! - 1 USD = `Cents(100)`.
//! - There is no `From<i64>`; callers construct amounts with `Cents::new`
//!   or `Cents::from_dollars` so unrelated integers never mix with money.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Cents per whole currency unit.
pub const CENTS_PER_DOLLAR: i64 = 100;

/// A monetary amount stored as whole cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Zero amount.
    pub const ZERO: Cents = Cents(0);

    /// Constructs an amount from a raw cent count.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Cents(raw)
    }

    /// Constructs an amount from whole dollars.
    #[inline]
    pub const fn from_dollars(dollars: i64) -> Self {
        Cents(dollars * CENTS_PER_DOLLAR)
    }

    /// Returns the raw cent count for storage boundaries.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Addition with overflow detection.
    #[inline]
    pub fn checked_add(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_add(rhs.0).map(Cents)
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Cents {
    type Output = Cents;

    #[inline]
    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    #[inline]
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, Add::add)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let per_dollar = CENTS_PER_DOLLAR.unsigned_abs();
        write!(
            f,
            "{sign}${}.{:02}",
            magnitude / per_dollar,
            magnitude % per_dollar
        )
    }
}
