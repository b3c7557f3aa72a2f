//! Value Objects for the cart

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Money value object.
///
/// The storefront prices everything in USD, so the currency is implied.
/// Amounts are exact decimals; rounding only happens on display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn from_cents(cents: i64) -> Self { Self(Decimal::new(cents, 2)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }

    /// `pct` percent of this amount, e.g. `percent(10)` of 99.98 is 9.998.
    pub fn percent(&self, pct: Decimal) -> Money { Money(self.0 * pct / Decimal::ONE_HUNDRED) }

    pub fn scale(&self, rate: Decimal) -> Money { Money(self.0 * rate) }

    /// Negative amounts collapse to zero.
    pub fn floor_zero(self) -> Money { if self.0.is_sign_negative() { Money::ZERO } else { self } }

    /// Four decimal places, midpoints rounded away from zero.
    pub fn rounded(&self) -> Money {
        Money(self.0.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "${:.2}", self.0) }
}
