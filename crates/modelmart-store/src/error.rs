//! Error types for modelmart storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g. "account", "model").
        entity: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Record already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Entity type.
        entity: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Debit would take a balance below zero.
    #[error("insufficient credits: required={required}, available={available}")]
    InsufficientCredits {
        /// Amount the transfer needed.
        required: i64,
        /// Balance of the debit account.
        available: i64,
    },

    /// A transfer with the same idempotency key was already applied.
    #[error("duplicate transfer: {key}")]
    DuplicateTransfer {
        /// The idempotency key.
        key: String,
    },

    /// Amount is negative or would overflow a balance.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl StoreError {
    pub(crate) fn account_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "account",
            id: id.to_string(),
        }
    }
}
