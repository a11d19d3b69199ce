//! Storage collaborators for accounts and orders.
//!
//! The traits in [`store`] are the only contract the workflows depend on.
//! Two implementations are provided: [`InMemoryStore`] for tests and
//! single-process use, and [`PostgresStore`] backed by `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{Fault, InMemoryStore, OPERATION_LOG_CAPACITY, StoreOperation};
pub use postgres::PostgresStore;
pub use store::{AccountStore, OrderStore, RowsAffected, Transaction, UnitOfWork};
