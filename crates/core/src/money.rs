//! Money in the smallest currency unit (fen, 1/100 yuan).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Non-negative amount of money in fen.
///
/// All arithmetic is checked; overflow is a validation error rather than a wrap.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_fen(fen: u64) -> Self {
        Self(fen)
    }

    pub const fn from_yuan(yuan: u64) -> Self {
        Self(yuan * 100)
    }

    pub fn fen(self) -> u64 {
        self.0
    }

    /// Amount in yuan, for JSON responses.
    pub fn as_yuan_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_mul(self, quantity: u32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub fn checked_add(self, other: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| Money(acc.0.saturating_add(m.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuan_conversions() {
        let price = Money::from_yuan(120);
        assert_eq!(price.fen(), 12_000);
        assert_eq!(price.as_yuan_f64(), 120.0);
        assert_eq!(price.to_string(), "120.00");
    }

    #[test]
    fn multiplication_is_checked() {
        assert_eq!(Money::from_yuan(50).checked_mul(3).unwrap(), Money::from_yuan(150));
        assert!(Money::from_fen(u64::MAX).checked_mul(2).is_err());
    }

    #[test]
    fn sums_fold_from_zero() {
        let total: Money = [Money::from_yuan(1), Money::from_fen(50)].into_iter().sum();
        assert_eq!(total, Money::from_fen(150));
    }
}
