//! Process wiring for the consumption ledger.
//!
//! Builds the services over either the in-memory store or PostgreSQL and
//! runs a short demonstration of the workflows.

pub mod config;

use common::{AccountId, OrderId};
use domain::Money;
use service::{
    AccountService, ConsumptionAudit, CreateAccount, CreateOrder, InvalidateOrder, OrderService,
    ServiceError,
};
use sqlx::postgres::PgPoolOptions;
use store::{AccountStore, OrderStore, PostgresStore, StoreError, UnitOfWork};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::{Config, ConfigError, DatabaseConfig, LogFormat};

/// Errors that stop the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Failed to install log subscriber: {0}")]
    Tracing(String),
}

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .map_err(|e| AppError::Tracing(e.to_string()))
}

/// Opens a pool to PostgreSQL and applies pending migrations.
pub async fn connect_postgres(config: &DatabaseConfig) -> Result<PostgresStore, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.connect_options())
        .await?;

    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!(host = %config.host, database = %config.name, "connected to postgres");
    Ok(store)
}

/// The services sharing one backing store.
pub struct App<S>
where
    S: AccountStore + OrderStore + UnitOfWork + Clone,
{
    pub accounts: AccountService<S>,
    pub orders: OrderService<S, S, S>,
}

impl<S> App<S>
where
    S: AccountStore + OrderStore + UnitOfWork + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            orders: OrderService::new(store.clone(), store.clone(), store),
        }
    }
}

/// Identifiers and final audit produced by [`run_demo`].
#[derive(Debug)]
pub struct DemoReport {
    pub account_id: AccountId,
    pub order_id: OrderId,
    pub audit: ConsumptionAudit,
}

/// Opens an account, places an order, invalidates it and audits the total.
pub async fn run_demo<S>(app: &App<S>, email: &str) -> Result<DemoReport, AppError>
where
    S: AccountStore + OrderStore + UnitOfWork + Clone,
{
    let account_id = app
        .accounts
        .create_account(CreateAccount::new("Demo Customer", email))
        .await?;

    let order_id = app
        .orders
        .create_order(CreateOrder::new(account_id, Money::from_major(25)))
        .await?;
    let account = app.accounts.get_account(account_id).await?;
    tracing::info!(%account_id, total = %account.consumption_total(), "total after order");

    app.orders
        .invalidate_order(InvalidateOrder::new(order_id))
        .await?;

    let audit = app.orders.audit_consumption(account_id).await?;
    tracing::info!(
        %account_id,
        total = %audit.recorded_total,
        valid_orders = audit.valid_orders,
        invalid_orders = audit.invalid_orders,
        consistent = audit.is_consistent(),
        "audit complete"
    );

    Ok(DemoReport {
        account_id,
        order_id,
        audit,
    })
}
