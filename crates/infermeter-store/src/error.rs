//! Error types for infermeter storage.

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
    #[error("not found")]
    NotFound,

    /// Account exists but is deactivated.
    #[error("account inactive")]
    Inactive,

    /// Email is already registered.
    #[error("email already registered: {email}")]
    EmailTaken {
        /// The duplicate email.
        email: String,
    },

    /// Balance does not cover the price at admission time.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance in credits.
        balance: i64,
        /// Required amount in credits.
        required: i64,
    },

    /// Balance arithmetic would overflow the credit counter.
    #[error("balance overflow")]
    Overflow,
}
