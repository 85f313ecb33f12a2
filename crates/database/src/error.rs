//! Database error types.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Record rejected before reaching the database
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

pub(crate) fn map_unique_violation(e: sqlx::Error, entity: &'static str, id: &str) -> DatabaseError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return DatabaseError::AlreadyExists {
                entity,
                id: id.to_string(),
            };
        }
    }
    DatabaseError::Sqlx(e)
}
