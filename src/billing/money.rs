use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign},
};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::percentage::Percentage;

/// Amount of money in cents. Kept integral so totals add up exactly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(from = "f64", into = "f64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Price of `duration` at `self` per hour, rounded half up to the cent.
    pub fn per_hour(&self, duration: Duration) -> Money {
        Money(div_round(self.0 as i128 * duration.num_seconds() as i128, 3600))
    }

    /// `percentage` of this amount, rounded half up to the cent.
    pub fn percent(&self, percentage: Percentage) -> Money {
        // Percentages are applied with a precision of 1/10000 of a percent.
        let scaled = (*percentage * 10_000.).round() as i128;
        Money(div_round(self.0 as i128 * scaled, 1_000_000))
    }
}

fn div_round(value: i128, divisor: i128) -> i64 {
    (value * 2 + divisor).div_euclid(divisor * 2) as i64
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<f64> for Money {
    fn from(value: f64) -> Self {
        Money((value * 100.).round() as i64)
    }
}

impl From<Money> for f64 {
    fn from(value: Money) -> Self {
        value.0 as f64 / 100.
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}
