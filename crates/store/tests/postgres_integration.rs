//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{AccountId, OrderId};
use domain::{Account, Money};
use sqlx::PgPool;
use store::{AccountStore, OrderStore, PostgresStore, StoreError, UnitOfWork};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders, accounts")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_account(store: &PostgresStore, email: &str, total: i64) -> Account {
    let mut account = Account::create("test", email).unwrap();
    account.add_consumption(Money::from_cents(total)).unwrap();
    let id = store.save_account(&account).await.unwrap();
    store.find_account(id).await.unwrap()
}

#[tokio::test]
async fn save_and_find_account() {
    let store = get_test_store().await;
    let account = seed_account(&store, "test@example.com", 2000).await;

    assert_eq!(account.name(), "test");
    assert_eq!(account.consumption_total().cents(), 2000);

    let by_email = store
        .find_account_by_email("test@example.com")
        .await
        .unwrap();
    assert_eq!(by_email.id(), account.id());
}

#[tokio::test]
async fn missing_account_is_not_found() {
    let store = get_test_store().await;

    let err = store.find_account(AccountId::generate()).await.unwrap_err();
    assert!(err.is_not_found());

    let err = store
        .find_account_by_email("cannot@find.com")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn duplicate_email_is_a_constraint_violation() {
    let store = get_test_store().await;
    seed_account(&store, "dup@example.com", 0).await;

    let again = Account::create("again", "dup@example.com").unwrap();
    let err = store.save_account(&again).await.unwrap_err();

    assert!(matches!(
        err,
        StoreError::ConstraintViolation { ref constraint } if constraint == "accounts_email_key"
    ));
}

#[tokio::test]
async fn email_uniqueness_and_lookup_ignore_case() {
    let store = get_test_store().await;
    let account = seed_account(&store, "dup@example.com", 0).await;

    let found = store
        .find_account_by_email("DUP@Example.com")
        .await
        .unwrap();
    assert_eq!(found.id(), account.id());

    let shouted = Account::restore(AccountId::generate(), "again", "Dup@EXAMPLE.com", Money::zero());
    let err = store.save_account(&shouted).await.unwrap_err();

    assert!(matches!(
        err,
        StoreError::ConstraintViolation { ref constraint } if constraint == "accounts_email_key"
    ));
}

#[tokio::test]
async fn conditional_total_update_detects_stale_copy() {
    let store = get_test_store().await;
    let mut account = seed_account(&store, "test@example.com", 0).await;
    account.add_consumption(Money::from_cents(1000)).unwrap();

    assert_eq!(store.update_consumption_total(&account).await.unwrap(), 1);
    assert_eq!(store.update_consumption_total(&account).await.unwrap(), 0);

    let found = store.find_account(account.id().unwrap()).await.unwrap();
    assert_eq!(found.consumption_total().cents(), 1000);
}

#[tokio::test]
async fn order_round_trip_and_validity_update() {
    let store = get_test_store().await;
    let account = seed_account(&store, "test@example.com", 1000).await;
    let order = Account::create_order(account.id().unwrap(), Money::from_cents(1000)).unwrap();

    let order_id = store.save_order(&order).await.unwrap();
    let found = store.find_order(order_id).await.unwrap();
    assert_eq!(found.account_id(), account.id().unwrap());
    assert_eq!(found.amount().cents(), 1000);
    assert!(found.is_valid());

    assert_eq!(store.update_validity(order_id, false).await.unwrap(), 1);
    assert_eq!(store.update_validity(order_id, false).await.unwrap(), 0);
    assert!(!store.find_order(order_id).await.unwrap().is_valid());

    assert_eq!(
        store.update_validity(OrderId::generate(), false).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn orders_listed_by_account() {
    let store = get_test_store().await;
    let account = seed_account(&store, "test@example.com", 0).await;
    let account_id = account.id().unwrap();

    for cents in [100, 200] {
        let order = Account::create_order(account_id, Money::from_cents(cents)).unwrap();
        store.save_order(&order).await.unwrap();
    }

    let orders = store.find_orders_by_account(account_id).await.unwrap();
    assert_eq!(orders.len(), 2);
}

#[tokio::test]
async fn transaction_commit_and_rollback() {
    let store = get_test_store().await;
    let mut account = seed_account(&store, "test@example.com", 200).await;
    account.add_consumption(Money::from_cents(500)).unwrap();
    let order = Account::create_order(account.id().unwrap(), Money::from_cents(500)).unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.update_consumption_total(&account).await.unwrap(), 1);
    tx.save_order(&order).await.unwrap();
    tx.rollback().await.unwrap();

    let found = store.find_account(account.id().unwrap()).await.unwrap();
    assert_eq!(found.consumption_total().cents(), 200);
    assert!(
        store
            .find_orders_by_account(account.id().unwrap())
            .await
            .unwrap()
            .is_empty()
    );

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.update_consumption_total(&account).await.unwrap(), 1);
    tx.save_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    let found = store.find_account(account.id().unwrap()).await.unwrap();
    assert_eq!(found.consumption_total().cents(), 700);
}
