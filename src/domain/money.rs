use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::error::{LedgerError, Result};

/// Number of fractional digits carried by every monetary value.
pub const SCALE: u32 = 4;

/// Rounds a raw decimal to the ledger scale, half-up (midpoint away from
/// zero). This is the single rounding rule of the crate; the fee policy and
/// amount validation both go through it.
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A positive monetary amount with at most [`SCALE`] fractional digits.
///
/// Transaction amounts are always strictly positive; direction is carried by
/// the operation, never by the sign.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} is not positive"
            )));
        }
        if quantize(value) != value {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} has more than {SCALE} fractional digits"
            )));
        }
        Ok(Self(value))
    }

    /// Wraps a value the caller has already quantized and sign-checked.
    pub(crate) fn from_raw(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A signed account balance.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_must_be_positive() {
        assert!(Amount::new(dec!(0.0001)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-5)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn amount_rejects_sub_scale_values() {
        assert!(matches!(
            Amount::new(dec!(0.00005)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(Amount::new(dec!(1.2345)).is_ok());
    }

    #[test]
    fn quantize_rounds_half_up() {
        assert_eq!(quantize(dec!(1.66685)), dec!(1.6669));
        assert_eq!(quantize(dec!(1.66684)), dec!(1.6668));
        assert_eq!(quantize(dec!(1.99995)), dec!(2.0000));
    }

    #[test]
    fn balance_arithmetic() {
        let a = Balance::new(dec!(10.0));
        let b = Balance::new(dec!(4.5));
        assert_eq!(a + b, Balance::new(dec!(14.5)));
        assert_eq!(a - b, Balance::new(dec!(5.5)));

        let mut c = Balance::ZERO;
        c += Balance::from(Amount::new(dec!(2.25)).unwrap());
        c -= Balance::new(dec!(0.25));
        assert_eq!(c, Balance::new(dec!(2.00)));
    }
}
