//! Account and order workflows.
//!
//! The workflows load fresh entities through the store contracts, apply the
//! domain rules in memory and commit the resulting writes through a single
//! unit of work:
//! - [`AccountService::create_account`] enforces email uniqueness
//! - [`OrderService::create_order`] inserts an order and raises the total
//! - [`OrderService::invalidate_order`] switches an order off and lowers the total
//!
//! Services hold no state besides their store handles and may be shared
//! between concurrent callers.

pub mod account_service;
pub mod commands;
pub mod error;
pub mod order_service;
pub mod plan;

pub use account_service::AccountService;
pub use commands::{CreateAccount, CreateOrder, InvalidateOrder};
pub use error::{ErrorKind, ServiceError};
pub use order_service::{ConsumptionAudit, OrderService};
pub use plan::{AtomicPlan, Mutation, PlanOutcome, Step};
