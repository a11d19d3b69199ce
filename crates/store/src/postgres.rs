use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, OrderId};
use domain::{Account, Money, Order};
use sqlx::{PgExecutor, PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{AccountStore, OrderStore, RowsAffected, Transaction, UnitOfWork},
};

/// PostgreSQL-backed account and order store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_account(row: PgRow) -> Result<Account> {
    Ok(Account::restore(
        AccountId::from_uuid(row.try_get::<Uuid, _>("id")?),
        row.try_get::<String, _>("name")?,
        row.try_get::<String, _>("email")?,
        Money::from_cents(row.try_get("consumption_total_cents")?),
    ))
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order::restore(
        OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
        Money::from_cents(row.try_get("amount_cents")?),
        row.try_get::<DateTime<Utc>, _>("created_at")?,
        row.try_get("is_valid")?,
    ))
}

/// Maps constraint violations to `StoreError::ConstraintViolation`.
fn write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
    {
        return StoreError::ConstraintViolation {
            constraint: constraint.to_string(),
        };
    }
    StoreError::Database(e)
}

// Write helpers shared by the pool-backed stores and open transactions.

async fn write_consumption_total<'e, E>(executor: E, account: &Account) -> Result<RowsAffected>
where
    E: PgExecutor<'e>,
{
    let id = account
        .id()
        .ok_or(StoreError::MissingId { entity: "account" })?;

    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET consumption_total_cents = $2
        WHERE id = $1 AND consumption_total_cents = $3
        "#,
    )
    .bind(id.as_uuid())
    .bind(account.consumption_total().cents())
    .bind(account.stored_total().cents())
    .execute(executor)
    .await
    .map_err(write_error)?;

    Ok(result.rows_affected())
}

async fn insert_order<'e, E>(executor: E, order: &Order) -> Result<OrderId>
where
    E: PgExecutor<'e>,
{
    let id = OrderId::generate();

    sqlx::query(
        r#"
        INSERT INTO orders (id, account_id, amount_cents, created_at, is_valid)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id.as_uuid())
    .bind(order.account_id().as_uuid())
    .bind(order.amount().cents())
    .bind(order.created_at())
    .bind(order.is_valid())
    .execute(executor)
    .await
    .map_err(write_error)?;

    Ok(id)
}

async fn write_validity<'e, E>(executor: E, id: OrderId, is_valid: bool) -> Result<RowsAffected>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE orders SET is_valid = $2 WHERE id = $1 AND is_valid <> $2")
        .bind(id.as_uuid())
        .bind(is_valid)
        .execute(executor)
        .await
        .map_err(write_error)?;

    Ok(result.rows_affected())
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn find_account(&self, id: AccountId) -> Result<Account> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, email, consumption_total_cents FROM accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_account(row),
            None => Err(StoreError::not_found("Account", id)),
        }
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Account> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, email, consumption_total_cents FROM accounts WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_account(row),
            None => Err(StoreError::not_found("Account", email)),
        }
    }

    async fn save_account(&self, account: &Account) -> Result<AccountId> {
        let id = AccountId::generate();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, consumption_total_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(account.name())
        .bind(account.email())
        .bind(account.consumption_total().cents())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(id)
    }

    async fn update_consumption_total(&self, account: &Account) -> Result<RowsAffected> {
        write_consumption_total(&self.pool, account).await
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn find_order(&self, id: OrderId) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, account_id, amount_cents, created_at, is_valid FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::not_found("Order", id)),
        }
    }

    async fn find_orders_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount_cents, created_at, is_valid
            FROM orders
            WHERE account_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn save_order(&self, order: &Order) -> Result<OrderId> {
        insert_order(&self.pool, order).await
    }

    async fn update_validity(&self, id: OrderId, is_valid: bool) -> Result<RowsAffected> {
        write_validity(&self.pool, id, is_valid).await
    }
}

#[async_trait]
impl UnitOfWork for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// An open PostgreSQL transaction.
///
/// Dropping it without committing rolls back, as with any `sqlx`
/// transaction.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn update_consumption_total(&mut self, account: &Account) -> Result<RowsAffected> {
        write_consumption_total(&mut *self.tx, account).await
    }

    async fn save_order(&mut self, order: &Order) -> Result<OrderId> {
        insert_order(&mut *self.tx, order).await
    }

    async fn update_validity(&mut self, id: OrderId, is_valid: bool) -> Result<RowsAffected> {
        write_validity(&mut *self.tx, id, is_valid).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        tracing::debug!("postgres transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        tracing::debug!("postgres transaction rolled back");
        Ok(())
    }
}
