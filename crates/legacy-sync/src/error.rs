//! Error types for the synchronization engine.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for sync operations.
///
/// Coercion failures are deliberately absent: a field that cannot be parsed
/// resolves to its declared default and the run continues (§ field coercion
/// contract). Everything here is fatal for the one entity run it occurs in.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The legacy export file could not be opened or read.
    #[error("Legacy file unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The legacy file opened but its header or record layout is malformed.
    #[error("Legacy file malformed: {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// A column the entity descriptor requires is absent from the file schema.
    #[error("Required column {field} missing from {file}")]
    SchemaMismatch { file: String, field: String },

    /// Connection pool error with context.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Target store rejected the write transaction.
    #[error("Target write failed for {entity}: {message}")]
    Write { entity: String, message: String },

    /// Target database connection or query error.
    #[error("Target database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// A background sync task panicked or was aborted.
    #[error("Sync task failed: {0}")]
    Task(String),

    /// IO error (config file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Write error for an entity.
    pub fn write(entity: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Write {
            entity: entity.into(),
            message: message.to_string(),
        }
    }

    /// Create a Malformed error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SyncError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
