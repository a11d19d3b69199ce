//! Monetary amounts.

use serde::{Deserialize, Serialize};

/// Money amount represented in minor units (cents) to avoid floating point
/// drift. Values may be negative when used as a deduction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates an amount from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates an amount from whole major units, saturating at the bounds.
    pub const fn from_major(units: i64) -> Self {
        Self {
            cents: units.saturating_mul(100),
        }
    }

    /// Returns zero.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Subtracts `other`, saturating at the bounds.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money::from_cents(self.cents.saturating_sub(other.cents))
    }

    /// Sums `amounts`, returning `None` on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    /// Negates the amount; `i64::MIN` saturates to `i64::MAX`.
    fn neg(self) -> Self::Output {
        Money {
            cents: self.cents.saturating_neg(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major() {
        assert_eq!(Money::from_major(12).cents(), 1200);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_from_major_saturates() {
        assert_eq!(Money::from_major(i64::MAX).cents(), i64::MAX);
        assert_eq!(Money::from_major(i64::MIN).cents(), i64::MIN);
    }

    #[test]
    fn test_negation_and_checked_sum() {
        let amounts = [Money::from_cents(100), -Money::from_cents(30)];
        assert_eq!(Money::checked_sum(amounts), Some(Money::from_cents(70)));
        assert_eq!(-Money::from_cents(i64::MIN), Money::from_cents(i64::MAX));
    }

    #[test]
    fn test_checked_sum_overflow() {
        let amounts = [Money::from_cents(i64::MAX), Money::from_cents(1)];
        assert_eq!(Money::checked_sum(amounts), None);
        assert_eq!(Money::checked_sum([]), Some(Money::zero()));
    }

    #[test]
    fn test_saturating_sub() {
        assert_eq!(
            Money::from_cents(i64::MIN).saturating_sub(Money::from_cents(1)),
            Money::from_cents(i64::MIN)
        );
        assert_eq!(
            Money::from_cents(75).saturating_sub(Money::from_cents(100)),
            Money::from_cents(-25)
        );
    }

    #[test]
    fn test_checked_add_overflow() {
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
        assert_eq!(
            Money::from_cents(1).checked_add(Money::from_cents(2)),
            Some(Money::from_cents(3))
        );
    }

    #[test]
    fn test_serializes_as_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(250)).unwrap(), "250");
    }
}
