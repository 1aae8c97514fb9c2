use sea_orm::error::DbErr;
use serde::Serialize;

/// Unified error type for every storefront operation.
///
/// All service methods return this; the presentation layer owns user-facing
/// messaging and retries. A `DatabaseError` inside a transaction always means
/// the transaction was rolled back.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Actor does not own the targeted resource.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Actor lacks the admin role required by the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Hash error: {0}")]
    HashError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Convenience constructor for wrapping string-based database errors.
    pub fn database_error_message(message: impl Into<String>) -> Self {
        ServiceError::DatabaseError(DbErr::Custom(message.into()))
    }

    /// True when the underlying cause was the persistence layer rather than
    /// the request itself.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, ServiceError::DatabaseError(_))
    }

    /// Returns the message suitable for end users.
    ///
    /// Internal failures return generic messages so persistence and hashing
    /// details never leak into responses.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}
