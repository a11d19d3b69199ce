use async_trait::async_trait;
use common::{AccountId, OrderId};
use domain::{Account, Order};

use crate::Result;

/// Number of rows a conditional update reported as changed.
pub type RowsAffected = u64;

/// Persistence contract for accounts.
///
/// Lookups report a missing record as `StoreError::NotFound`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: AccountId) -> Result<Account>;

    async fn find_account_by_email(&self, email: &str) -> Result<Account>;

    /// Inserts a new account and returns the identifier assigned to it.
    async fn save_account(&self, account: &Account) -> Result<AccountId>;

    /// Writes the account's consumption total.
    ///
    /// The row is matched by identifier and by `account.stored_total()`, so a
    /// row changed by someone else since it was read is left alone and
    /// reported as 0 rows affected.
    async fn update_consumption_total(&self, account: &Account) -> Result<RowsAffected>;
}

/// Persistence contract for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, id: OrderId) -> Result<Order>;

    /// Returns every order owned by the account, oldest first.
    async fn find_orders_by_account(&self, account_id: AccountId) -> Result<Vec<Order>>;

    /// Inserts a new order and returns the identifier assigned to it.
    async fn save_order(&self, order: &Order) -> Result<OrderId>;

    /// Sets the validity flag. Only a row whose flag actually changes counts
    /// as affected.
    async fn update_validity(&self, id: OrderId, is_valid: bool) -> Result<RowsAffected>;
}

/// Opens atomic scopes spanning both stores.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// An open atomic scope.
///
/// Writes issued through a transaction become visible together on `commit`.
/// `rollback`, or dropping the transaction without committing, discards them.
#[async_trait]
pub trait Transaction: Send {
    async fn update_consumption_total(&mut self, account: &Account) -> Result<RowsAffected>;

    async fn save_order(&mut self, order: &Order) -> Result<OrderId>;

    async fn update_validity(&mut self, id: OrderId, is_valid: bool) -> Result<RowsAffected>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
