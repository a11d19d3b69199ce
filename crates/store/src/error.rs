use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matches the lookup key.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A conditional update was requested for a record that was never saved.
    #[error("Cannot update an unsaved {entity}")]
    MissingId { entity: &'static str },

    /// The write violates a uniqueness, reference or check constraint.
    #[error("Constraint violated: {constraint}")]
    ConstraintViolation { constraint: String },

    /// A backend failure that is not a database driver error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns true for the store-level "no such record" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
