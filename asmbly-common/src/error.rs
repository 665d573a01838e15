//! Common error types for Asmbly services

use thiserror::Error;

/// Common result type for Asmbly operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Asmbly services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A keyed upsert touched an unexpected number of rows.
    ///
    /// Never retried: it means the table no longer enforces the key the
    /// write relies on.
    #[error("Persistence conflict on {table} ({key}): {rows} rows affected")]
    PersistenceConflict {
        table: &'static str,
        key: String,
        rows: u64,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
