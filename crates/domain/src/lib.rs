//! Domain layer for the consumption ledger.
//!
//! This crate holds the two entities and the rules they own:
//! - `Account` keeps a running consumption total that may never go negative
//! - `Order` carries a validity flag that can only move from valid to invalid
//! - `Money` stores amounts as integer minor units
//!
//! Nothing here performs I/O. Persistence is the job of the `store` crate and
//! multi-entity workflows live in the `service` crate.

pub mod account;
pub mod money;
pub mod order;

pub use account::{ACCEPTED_EMAIL_DOMAINS, Account, AccountError, normalize_email, validate_email};
pub use common::{AccountId, OrderId};
pub use money::Money;
pub use order::{Order, OrderError};
