//! Error types for homemon-store.

use std::path::PathBuf;

/// Result type for homemon-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in homemon-store.
///
/// Nothing is retried inside the store. [`Error::InvalidTimestamp`] on insert
/// means the reading itself was rejected; every other variant is a storage
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Timestamp outside the range the store can represent.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The database was written by a newer schema than this build knows.
    #[error("Unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },

    /// The store is unreachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
