//! Order workflows.
//!
//! Both write workflows follow the same shape: load fresh entities, apply the
//! domain change in memory, then commit every write through one
//! [`AtomicPlan`]. Nothing is written when any check before the plan fails.

use common::{AccountId, OrderId};
use domain::{Account, AccountError, Money, Order};
use serde::Serialize;
use store::{AccountStore, OrderStore, StoreError, UnitOfWork};

use crate::commands::{CreateOrder, InvalidateOrder};
use crate::error::{NotFoundExt, Result, ServiceError, record_rejection};
use crate::plan::AtomicPlan;

/// Comparison between an account's recorded total and its valid orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionAudit {
    pub account_id: AccountId,
    pub recorded_total: Money,
    pub valid_orders_total: Money,
    pub valid_orders: usize,
    pub invalid_orders: usize,
}

impl ConsumptionAudit {
    /// Whether the recorded total equals the sum of valid order amounts.
    pub fn is_consistent(&self) -> bool {
        self.recorded_total == self.valid_orders_total
    }

    /// Recorded total minus the sum of valid order amounts.
    pub fn discrepancy(&self) -> Money {
        self.recorded_total.saturating_sub(self.valid_orders_total)
    }
}

/// Service for placing, invalidating and auditing orders.
pub struct OrderService<A, O, U>
where
    A: AccountStore,
    O: OrderStore,
    U: UnitOfWork,
{
    accounts: A,
    orders: O,
    uow: U,
}

impl<A, O, U> OrderService<A, O, U>
where
    A: AccountStore,
    O: OrderStore,
    U: UnitOfWork,
{
    pub fn new(accounts: A, orders: O, uow: U) -> Self {
        Self {
            accounts,
            orders,
            uow,
        }
    }

    /// Places an order and charges its amount to the account.
    ///
    /// The total update runs first and must touch exactly one row; only then
    /// is the order inserted. Both writes commit together.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderId> {
        self.run_create_order(cmd)
            .await
            .inspect(|order_id| {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(%order_id, account_id = %cmd.account_id, amount = %cmd.amount, "order created");
            })
            .inspect_err(|err| record_rejection("create_order", err))
    }

    async fn run_create_order(&self, cmd: CreateOrder) -> Result<OrderId> {
        let mut account = self.load_account(cmd.account_id).await?;

        let order = Account::create_order(cmd.account_id, cmd.amount)
            .map_err(ServiceError::OrderCreationFailed)?;
        account
            .add_consumption(cmd.amount)
            .map_err(ServiceError::AmountValidationFailed)?;

        let outcome = AtomicPlan::new()
            .update_consumption_total(account)
            .save_order(order)
            .execute(&self.uow)
            .await?;

        outcome
            .saved_orders
            .first()
            .copied()
            .ok_or_else(|| StoreError::Backend("order insert returned no id".to_string()).into())
    }

    /// Marks an order invalid and takes its amount back off the account.
    ///
    /// The validity update runs first and must touch exactly one row, then
    /// the total update must touch exactly one row. Both writes commit
    /// together.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate_order(&self, cmd: InvalidateOrder) -> Result<()> {
        self.run_invalidate_order(cmd)
            .await
            .inspect(|_| {
                metrics::counter!("orders_invalidated_total").increment(1);
                tracing::info!(order_id = %cmd.order_id, "order invalidated");
            })
            .inspect_err(|err| record_rejection("invalidate_order", err))
    }

    async fn run_invalidate_order(&self, cmd: InvalidateOrder) -> Result<()> {
        let order_id = cmd.order_id;
        let mut order = self
            .orders
            .find_order(order_id)
            .await
            .or_not_found(|| ServiceError::OrderNotFound(order_id))?;

        let amount = order
            .invalidate()
            .map_err(|_| ServiceError::OrderAlreadyInvalid(order_id))?;

        let account_id = order.account_id();
        let mut account = self
            .accounts
            .find_account(account_id)
            .await
            .or_not_found(|| ServiceError::OwningAccountNotFound {
                order_id,
                account_id,
            })?;

        account.add_consumption(-amount).map_err(|err| match err {
            AccountError::NegativeTotal { current, .. } => {
                ServiceError::InsufficientConsumptionTotal {
                    account_id,
                    total: current,
                    amount,
                }
            }
            other => ServiceError::AmountValidationFailed(other),
        })?;

        AtomicPlan::new()
            .update_validity(order_id, false)
            .update_consumption_total(account)
            .execute(&self.uow)
            .await?;

        Ok(())
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .find_order(order_id)
            .await
            .or_not_found(|| ServiceError::OrderNotFound(order_id))
    }

    /// Lists an account's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, account_id: AccountId) -> Result<Vec<Order>> {
        self.load_account(account_id).await?;
        Ok(self.orders.find_orders_by_account(account_id).await?)
    }

    /// Compares the account's recorded total with the sum of its valid
    /// orders. Read-only; a mismatch is reported, never repaired.
    ///
    /// Fails with `AmountValidationFailed(TotalOverflow)` when the valid
    /// amounts do not fit in a `Money`.
    #[tracing::instrument(skip(self))]
    pub async fn audit_consumption(&self, account_id: AccountId) -> Result<ConsumptionAudit> {
        let account = self.load_account(account_id).await?;
        let orders = self.orders.find_orders_by_account(account_id).await?;

        let (valid, invalid): (Vec<_>, Vec<_>) = orders.iter().partition(|o| o.is_valid());
        let valid_orders_total = Money::checked_sum(valid.iter().map(|o| o.amount()))
            .ok_or(ServiceError::AmountValidationFailed(AccountError::TotalOverflow))?;
        let audit = ConsumptionAudit {
            account_id,
            recorded_total: account.consumption_total(),
            valid_orders_total,
            valid_orders: valid.len(),
            invalid_orders: invalid.len(),
        };

        if !audit.is_consistent() {
            tracing::warn!(
                %account_id,
                recorded = %audit.recorded_total,
                expected = %audit.valid_orders_total,
                "consumption total does not match valid orders"
            );
        }
        Ok(audit)
    }

    async fn load_account(&self, account_id: AccountId) -> Result<Account> {
        self.accounts
            .find_account(account_id)
            .await
            .or_not_found(|| ServiceError::AccountNotFound(account_id))
    }
}
