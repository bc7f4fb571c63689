//! Error types for pgcrud

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgcrud operations
pub type CrudResult<T> = Result<T, CrudError>;

/// Error types for CRUD operations
#[derive(Debug, Error)]
pub enum CrudError {
    /// A required argument was missing or empty. Raised before any connection is opened.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Could not open or acquire a connection (including acquisition timeout).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The engine rejected a statement issued by a named operation.
    #[error("{operation} failed for {target}: {message}")]
    Engine {
        operation: String,
        target: String,
        message: String,
        /// SQLSTATE reported by the server, if any.
        code: Option<String>,
    },

    /// Raw engine error, converted into [`CrudError::Engine`] at the operation boundary.
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A result column could not be converted to its display form.
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Catalog introspection found nothing for the requested object.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller raised the cancellation signal.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Statement exceeded the command timeout.
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),
}

impl CrudError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// SQLSTATE code of an engine error, if known.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Engine { code, .. } => code.as_deref(),
            Self::Query(err) => err.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate() == Some("23505")
    }

    /// Attach the operation name and target object to a raw engine error.
    ///
    /// Every other variant is returned unchanged.
    pub fn in_operation(self, operation: &str, target: &str) -> Self {
        match self {
            Self::Query(err) => {
                let (message, code) = match err.as_db_error() {
                    Some(db) => {
                        let mut message = db.message().to_string();
                        if let Some(detail) = db.detail() {
                            message.push_str(" (");
                            message.push_str(detail);
                            message.push(')');
                        }
                        (message, Some(db.code().code().to_string()))
                    }
                    None => (err.to_string(), None),
                };
                Self::Engine {
                    operation: operation.to_string(),
                    target: target.to_string(),
                    message,
                    code,
                }
            }
            other => other,
        }
    }
}

impl From<deadpool_postgres::PoolError> for CrudError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        use deadpool_postgres::PoolError;
        match err {
            PoolError::Timeout(kind) => {
                Self::Connection(format!("timed out acquiring a pooled connection ({kind:?})"))
            }
            PoolError::Backend(e) => Self::Connection(e.to_string()),
            other => Self::Connection(other.to_string()),
        }
    }
}
