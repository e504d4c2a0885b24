//! Error types for tenantkv
//!
//! Provides a unified error type for all manager, handler and engine operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvdbError
pub type Result<T> = std::result::Result<T, KvdbError>;

/// Unified error type for tenantkv operations
#[derive(Debug, Error)]
pub enum KvdbError {
    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("The DB {0} does not exist")]
    NotFound(String),

    #[error("Could not remove the DB {name}. Usage Reference Count: {ref_count}")]
    AlreadyInUse { name: String, ref_count: usize },

    #[error("Manager is not initialized")]
    NotInitialized,

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine error: {0}")]
    Engine(String),

    // -------------------------------------------------------------------------
    // Bulk Load Errors
    // -------------------------------------------------------------------------
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Format error: {0}")]
    Format(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl KvdbError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KvdbError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<sled::Error> for KvdbError {
    fn from(e: sled::Error) -> Self {
        KvdbError::Engine(e.to_string())
    }
}
