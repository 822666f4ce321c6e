//! Storage errors

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from repository operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store is unreachable or failing; aborts a pass
    #[error("Storage backend error: {message}")]
    Backend { message: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Constraint violated: {message}")]
    Constraint { message: String },

    #[error("Corrupt record: {message}")]
    Corrupt { message: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },
}

impl StoreError {
    /// Whether the error means the store itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Backend { .. })
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint {
                    message: err.to_string(),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::corrupt(err.to_string()),
            _ => StoreError::Backend {
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::corrupt(err.to_string())
    }
}
