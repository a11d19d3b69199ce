//! Account entity.

mod email;

pub use email::{ACCEPTED_EMAIL_DOMAINS, normalize_email, validate_email};

use common::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::order::Order;

/// Errors raised by account rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// The email is malformed or its domain is not accepted.
    #[error("Invalid email {email:?}: {reason}")]
    InvalidEmail { email: String, reason: &'static str },

    /// Applying the adjustment would leave a negative consumption total.
    #[error("Consumption total {current} cannot absorb adjustment {adjustment}")]
    NegativeTotal { current: Money, adjustment: Money },

    /// Orders cannot be created with a negative amount.
    #[error("Order amount {amount} must not be negative")]
    NegativeAmount { amount: Money },

    /// The adjustment does not fit in the total's representation.
    #[error("Consumption total overflow")]
    TotalOverflow,
}

/// An account and its running consumption total.
///
/// The total always equals the sum of the account's valid orders once a
/// workflow has committed. It never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: Option<AccountId>,
    name: String,
    email: String,
    consumption_total: Money,

    /// Total as last read from (or written to) the store. Conditional updates
    /// match on it.
    #[serde(skip)]
    stored_total: Money,
}

impl Account {
    /// Builds a new, unpersisted account with a zero total. The email is
    /// stored in its normalized form.
    pub fn create(name: impl Into<String>, email: impl Into<String>) -> Result<Self, AccountError> {
        let email = email.into();
        validate_email(&email)?;

        Ok(Self {
            id: None,
            name: name.into(),
            email: normalize_email(&email),
            consumption_total: Money::zero(),
            stored_total: Money::zero(),
        })
    }

    /// Rebuilds an account read from storage.
    pub fn restore(
        id: AccountId,
        name: impl Into<String>,
        email: impl Into<String>,
        consumption_total: Money,
    ) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            email: email.into(),
            consumption_total,
            stored_total: consumption_total,
        }
    }

    pub fn id(&self) -> Option<AccountId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn consumption_total(&self) -> Money {
        self.consumption_total
    }

    pub fn stored_total(&self) -> Money {
        self.stored_total
    }

    /// Adds `amount` to the consumption total.
    ///
    /// A negative `amount` is a deduction. Only the resulting total is
    /// checked: the call fails, leaving the account untouched, if the total
    /// would drop below zero.
    pub fn add_consumption(&mut self, amount: Money) -> Result<(), AccountError> {
        let next = self
            .consumption_total
            .checked_add(amount)
            .ok_or(AccountError::TotalOverflow)?;

        if next.is_negative() {
            return Err(AccountError::NegativeTotal {
                current: self.consumption_total,
                adjustment: amount,
            });
        }

        self.consumption_total = next;
        Ok(())
    }

    /// Builds a valid order for `account_id`. Negative amounts are refused.
    pub fn create_order(account_id: AccountId, amount: Money) -> Result<Order, AccountError> {
        if amount.is_negative() {
            return Err(AccountError::NegativeAmount { amount });
        }
        Ok(Order::new(account_id, amount))
    }
}
