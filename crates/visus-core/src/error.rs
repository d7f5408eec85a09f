//! Error types for visus-core

use thiserror::Error;

/// Result type alias using visus-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in visus-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Table schema declaration is invalid. Raised at registration time.
    #[error("Schema error in table '{table}': {message}")]
    Schema { table: String, message: String },

    /// No record with the given local id
    #[error("Record not found in '{table}': local id {local_id}")]
    NotFound { table: String, local_id: i64 },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid sync configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn schema(table: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error reports a missing record
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
