//! Workflow error types.

use common::{AccountId, OrderId};
use domain::{AccountError, Money};
use store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required entity does not exist.
    NotFound,
    /// The request clashes with existing state.
    Conflict,
    /// The request breaks an entity rule.
    Validation,
    /// A conditional update touched an unexpected number of rows.
    IntegrityMismatch,
    /// Any store or unit-of-work failure.
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::IntegrityMismatch => "integrity_mismatch",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the account and order workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order points at an account that does not exist.
    #[error("Order {order_id} belongs to missing account {account_id}")]
    OwningAccountNotFound {
        order_id: OrderId,
        account_id: AccountId,
    },

    /// Another account already uses the email. Carries that account's id.
    #[error("Email {email} already exists on account {existing}")]
    EmailAlreadyExists { email: String, existing: AccountId },

    #[error("Order already invalid: {0}")]
    OrderAlreadyInvalid(OrderId),

    #[error(transparent)]
    InvalidEmail(AccountError),

    /// The account refused to build the order (negative amount).
    #[error("Order creation failed: {0}")]
    OrderCreationFailed(#[source] AccountError),

    /// Applying the order amount to the account total was refused.
    #[error("Amount validation failed: {0}")]
    AmountValidationFailed(#[source] AccountError),

    /// Reversing the order would push the account total below zero.
    #[error("Account {account_id} total {total} cannot cover reversal of {amount}")]
    InsufficientConsumptionTotal {
        account_id: AccountId,
        total: Money,
        amount: Money,
    },

    #[error("Account {account_id} update affected {rows_affected} rows, expected {expected}")]
    AccountUpdateMismatch {
        account_id: AccountId,
        expected: u64,
        rows_affected: u64,
    },

    #[error("Order {order_id} update affected {rows_affected} rows, expected {expected}")]
    OrderUpdateMismatch {
        order_id: OrderId,
        expected: u64,
        rows_affected: u64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::AccountNotFound(_)
            | ServiceError::OrderNotFound(_)
            | ServiceError::OwningAccountNotFound { .. } => ErrorKind::NotFound,
            ServiceError::EmailAlreadyExists { .. } | ServiceError::OrderAlreadyInvalid(_) => {
                ErrorKind::Conflict
            }
            ServiceError::InvalidEmail(_)
            | ServiceError::OrderCreationFailed(_)
            | ServiceError::AmountValidationFailed(_)
            | ServiceError::InsufficientConsumptionTotal { .. } => ErrorKind::Validation,
            ServiceError::AccountUpdateMismatch { .. } | ServiceError::OrderUpdateMismatch { .. } => {
                ErrorKind::IntegrityMismatch
            }
            ServiceError::Store(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Converts a store "not found" into the workflow's own error, passing every
/// other store failure through unchanged.
pub(crate) trait NotFoundExt<T> {
    fn or_not_found(self, not_found: impl FnOnce() -> ServiceError) -> Result<T, ServiceError>;
}

impl<T> NotFoundExt<T> for store::Result<T> {
    fn or_not_found(self, not_found: impl FnOnce() -> ServiceError) -> Result<T, ServiceError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) if err.is_not_found() => Err(not_found()),
            Err(err) => Err(ServiceError::Store(err)),
        }
    }
}

/// Counts a rejected workflow by kind.
pub(crate) fn record_rejection(workflow: &'static str, err: &ServiceError) {
    metrics::counter!(
        "workflow_rejections_total",
        "workflow" => workflow,
        "kind" => err.kind().as_str()
    )
    .increment(1);
    tracing::warn!(workflow, kind = %err.kind(), error = %err, "workflow rejected");
}

/// Convenience type alias for workflow results.
pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let id = AccountId::generate();
        assert_eq!(ServiceError::AccountNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            ServiceError::EmailAlreadyExists {
                email: "dup@example.com".to_string(),
                existing: id,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ServiceError::OrderCreationFailed(AccountError::NegativeAmount {
                amount: Money::from_cents(-1)
            })
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ServiceError::AccountUpdateMismatch {
                account_id: id,
                expected: 1,
                rows_affected: 0,
            }
            .kind(),
            ErrorKind::IntegrityMismatch
        );
        assert_eq!(
            ServiceError::Store(StoreError::Backend("disk full".to_string())).kind(),
            ErrorKind::Infrastructure
        );
    }

    #[test]
    fn test_store_errors_display_unchanged() {
        let err = ServiceError::from(StoreError::Backend("connection error".to_string()));
        assert_eq!(err.to_string(), "Backend error: connection error");
    }

    #[test]
    fn test_not_found_mapping() {
        let order_id = OrderId::generate();
        let missing: store::Result<()> = Err(StoreError::NotFound {
            entity: "Order",
            key: order_id.to_string(),
        });
        assert!(matches!(
            missing.or_not_found(|| ServiceError::OrderNotFound(order_id)),
            Err(ServiceError::OrderNotFound(id)) if id == order_id
        ));

        let broken: store::Result<()> = Err(StoreError::Backend("boom".to_string()));
        assert!(matches!(
            broken.or_not_found(|| ServiceError::OrderNotFound(order_id)),
            Err(ServiceError::Store(StoreError::Backend(_)))
        ));
    }
}
