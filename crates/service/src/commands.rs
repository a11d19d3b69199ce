//! Commands accepted by the workflows.

use common::{AccountId, OrderId};
use domain::Money;

/// Command to open a new account.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub name: String,
    /// Must be unique across accounts.
    pub email: String,
}

impl CreateAccount {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Command to place an order and charge it to the account's total.
#[derive(Debug, Clone, Copy)]
pub struct CreateOrder {
    pub account_id: AccountId,
    pub amount: Money,
}

impl CreateOrder {
    pub fn new(account_id: AccountId, amount: Money) -> Self {
        Self { account_id, amount }
    }
}

/// Command to invalidate an order and reverse its amount.
#[derive(Debug, Clone, Copy)]
pub struct InvalidateOrder {
    pub order_id: OrderId,
}

impl InvalidateOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }
}
