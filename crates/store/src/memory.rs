use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use common::{AccountId, OrderId};
use domain::{Account, Order};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{AccountStore, OrderStore, RowsAffected, Transaction, UnitOfWork},
};

const EMAIL_CONSTRAINT: &str = "accounts_email_key";
const ORDER_ACCOUNT_CONSTRAINT: &str = "orders_account_id_fkey";

/// Most recent calls kept in the operation log.
pub const OPERATION_LOG_CAPACITY: usize = 1024;

/// Store calls that can be observed and intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    FindAccount,
    FindAccountByEmail,
    SaveAccount,
    UpdateConsumptionTotal,
    FindOrder,
    FindOrdersByAccount,
    SaveOrder,
    UpdateValidity,
    Begin,
    Commit,
    Rollback,
}

/// A one-shot interception of a store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fail the call with `StoreError::Backend`.
    Fail(String),

    /// Report this many affected rows without applying the write. Only
    /// meaningful for conditional updates; other calls ignore it.
    RowsAffected(RowsAffected),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    orders: HashMap<OrderId, Order>,
}

impl Tables {
    fn find_account(&self, id: AccountId) -> Result<Account> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Account", id))
    }

    fn find_account_by_email(&self, email: &str) -> Result<Account> {
        self.accounts
            .values()
            .find(|a| a.email().eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| StoreError::not_found("Account", email))
    }

    fn save_account(&mut self, account: &Account) -> Result<AccountId> {
        if self
            .accounts
            .values()
            .any(|a| a.email().eq_ignore_ascii_case(account.email()))
        {
            return Err(StoreError::ConstraintViolation {
                constraint: EMAIL_CONSTRAINT.to_string(),
            });
        }

        let id = AccountId::generate();
        self.accounts.insert(
            id,
            Account::restore(
                id,
                account.name(),
                account.email(),
                account.consumption_total(),
            ),
        );
        Ok(id)
    }

    fn update_consumption_total(&mut self, account: &Account) -> Result<RowsAffected> {
        let id = account
            .id()
            .ok_or(StoreError::MissingId { entity: "account" })?;

        match self.accounts.get_mut(&id) {
            Some(stored) if stored.consumption_total() == account.stored_total() => {
                *stored = Account::restore(
                    id,
                    stored.name(),
                    stored.email(),
                    account.consumption_total(),
                );
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn find_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    fn find_orders_by_account(&self, account_id: AccountId) -> Vec<Order> {
        let mut orders: Vec<_> = self
            .orders
            .values()
            .filter(|o| o.account_id() == account_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at());
        orders
    }

    fn save_order(&mut self, order: &Order) -> Result<OrderId> {
        if !self.accounts.contains_key(&order.account_id()) {
            return Err(StoreError::ConstraintViolation {
                constraint: ORDER_ACCOUNT_CONSTRAINT.to_string(),
            });
        }

        let id = OrderId::generate();
        self.orders.insert(id, order.clone().with_id(id));
        Ok(id)
    }

    fn update_validity(&mut self, id: OrderId, is_valid: bool) -> RowsAffected {
        match self.orders.get_mut(&id) {
            Some(stored) if stored.is_valid() != is_valid => {
                *stored = Order::restore(
                    id,
                    stored.account_id(),
                    stored.amount(),
                    stored.created_at(),
                    is_valid,
                );
                1
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    faults: HashMap<StoreOperation, Fault>,
    log: VecDeque<StoreOperation>,
}

impl Inner {
    /// Logs the call and applies a pending fault, if any.
    ///
    /// Returns `Some(rows)` when the caller should report that count instead
    /// of performing the write.
    fn intercept(&mut self, op: StoreOperation) -> Result<Option<RowsAffected>> {
        if self.log.len() == OPERATION_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(op);
        match self.faults.remove(&op) {
            Some(Fault::Fail(message)) => Err(StoreError::Backend(message)),
            Some(Fault::RowsAffected(rows)) => Ok(Some(rows)),
            None => Ok(None),
        }
    }
}

/// In-memory store for tests and single-process use.
///
/// Implements both stores and the unit-of-work boundary over one set of
/// tables. A transaction holds the store lock for its whole lifetime, so
/// calls made on the store itself while a transaction is open wait for it to
/// finish.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot fault for the next call to `op`.
    pub async fn inject_fault(&self, op: StoreOperation, fault: Fault) {
        self.inner.lock().await.faults.insert(op, fault);
    }

    /// Returns the most recent calls, oldest first. Only the last
    /// [`OPERATION_LOG_CAPACITY`] calls are kept.
    pub async fn operations(&self) -> Vec<StoreOperation> {
        self.inner.lock().await.log.iter().copied().collect()
    }

    /// Forgets the recorded calls.
    pub async fn clear_operations(&self) {
        self.inner.lock().await.log.clear();
    }

    pub async fn account_count(&self) -> usize {
        self.inner.lock().await.tables.accounts.len()
    }

    pub async fn order_count(&self) -> usize {
        self.inner.lock().await.tables.orders.len()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_account(&self, id: AccountId) -> Result<Account> {
        let mut inner = self.inner.lock().await;
        inner.intercept(StoreOperation::FindAccount)?;
        inner.tables.find_account(id)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Account> {
        let mut inner = self.inner.lock().await;
        inner.intercept(StoreOperation::FindAccountByEmail)?;
        inner.tables.find_account_by_email(email)
    }

    async fn save_account(&self, account: &Account) -> Result<AccountId> {
        let mut inner = self.inner.lock().await;
        inner.intercept(StoreOperation::SaveAccount)?;
        inner.tables.save_account(account)
    }

    async fn update_consumption_total(&self, account: &Account) -> Result<RowsAffected> {
        let mut inner = self.inner.lock().await;
        if let Some(rows) = inner.intercept(StoreOperation::UpdateConsumptionTotal)? {
            return Ok(rows);
        }
        inner.tables.update_consumption_total(account)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn find_order(&self, id: OrderId) -> Result<Order> {
        let mut inner = self.inner.lock().await;
        inner.intercept(StoreOperation::FindOrder)?;
        inner.tables.find_order(id)
    }

    async fn find_orders_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let mut inner = self.inner.lock().await;
        inner.intercept(StoreOperation::FindOrdersByAccount)?;
        Ok(inner.tables.find_orders_by_account(account_id))
    }

    async fn save_order(&self, order: &Order) -> Result<OrderId> {
        let mut inner = self.inner.lock().await;
        inner.intercept(StoreOperation::SaveOrder)?;
        inner.tables.save_order(order)
    }

    async fn update_validity(&self, id: OrderId, is_valid: bool) -> Result<RowsAffected> {
        let mut inner = self.inner.lock().await;
        if let Some(rows) = inner.intercept(StoreOperation::UpdateValidity)? {
            return Ok(rows);
        }
        Ok(inner.tables.update_validity(id, is_valid))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let mut guard = self.inner.clone().lock_owned().await;
        guard.intercept(StoreOperation::Begin)?;
        let staged = guard.tables.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Writes go to a staged copy of the tables which replaces the live tables
/// on commit.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Inner>,
    staged: Tables,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn update_consumption_total(&mut self, account: &Account) -> Result<RowsAffected> {
        if let Some(rows) = self
            .guard
            .intercept(StoreOperation::UpdateConsumptionTotal)?
        {
            return Ok(rows);
        }
        self.staged.update_consumption_total(account)
    }

    async fn save_order(&mut self, order: &Order) -> Result<OrderId> {
        self.guard.intercept(StoreOperation::SaveOrder)?;
        self.staged.save_order(order)
    }

    async fn update_validity(&mut self, id: OrderId, is_valid: bool) -> Result<RowsAffected> {
        if let Some(rows) = self.guard.intercept(StoreOperation::UpdateValidity)? {
            return Ok(rows);
        }
        Ok(self.staged.update_validity(id, is_valid))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { mut guard, staged } = *self;
        guard.intercept(StoreOperation::Commit)?;
        guard.tables = staged;
        tracing::debug!("in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { mut guard, .. } = *self;
        guard.intercept(StoreOperation::Rollback)?;
        tracing::debug!("in-memory transaction rolled back");
        Ok(())
    }
}
