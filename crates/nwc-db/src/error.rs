//! Database error types

use nwc_budget::StoreError;
use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored row could not be mapped back into a domain value
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Query(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            DbError::Query(sqlx::Error::RowNotFound) => StoreError::NotFound("row".to_string()),
            DbError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
