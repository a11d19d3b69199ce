//! Order entity.

use chrono::{DateTime, Utc};
use common::{AccountId, OrderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Errors raised by order rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order has already been invalidated.
    #[error("Order is already invalid")]
    AlreadyInvalid,
}

/// A purchase record owned by exactly one account.
///
/// `is_valid` starts out `true` and can only ever be switched off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,
    account_id: AccountId,
    amount: Money,
    created_at: DateTime<Utc>,
    is_valid: bool,
}

impl Order {
    pub(crate) fn new(account_id: AccountId, amount: Money) -> Self {
        Self {
            id: None,
            account_id,
            amount,
            created_at: Utc::now(),
            is_valid: true,
        }
    }

    /// Rebuilds an order read from storage.
    pub fn restore(
        id: OrderId,
        account_id: AccountId,
        amount: Money,
        created_at: DateTime<Utc>,
        is_valid: bool,
    ) -> Self {
        Self {
            id: Some(id),
            account_id,
            amount,
            created_at,
            is_valid,
        }
    }

    /// Returns a copy carrying the identifier assigned by the store.
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Switches the order off and returns the amount to reverse on the
    /// owning account.
    pub fn invalidate(&mut self) -> Result<Money, OrderError> {
        if !self.is_valid {
            return Err(OrderError::AlreadyInvalid);
        }
        self.is_valid = false;
        Ok(self.amount)
    }
}
