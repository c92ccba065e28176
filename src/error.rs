//! Error types for the relocation engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the relocation engine.
#[derive(Error, Debug)]
pub enum Error {
    // Planning errors
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Insufficient space at target: {required} bytes required, {available} bytes available")]
    InsufficientSpace { required: u64, available: u64 },

    // Execution errors
    #[error("Invalid migration options: {0}")]
    InvalidOptions(String),

    #[error("File conflict requires interactive resolution: {0}")]
    FileConflict(String),

    #[error("Locked file aborted migration: {}", .0.display())]
    LockedFileAbort(PathBuf),

    #[error("Link creation failed: {0}")]
    LinkCreation(String),

    #[error("Registry update failed: {0}")]
    RegistryUpdate(String),

    // Rollback errors
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Operation already rolled back: {0}")]
    AlreadyRolledBack(String),

    #[error("Invalid operation state: {0}")]
    InvalidState(String),

    #[error("Operation cancelled")]
    Cancelled,

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // Config errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Failure class of this error, as reported in operation results.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Planning(_) | Error::PathNotFound(_) | Error::NotADirectory(_) => {
                ErrorKind::PlanningError
            }
            Error::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            Error::InvalidOptions(_) | Error::Config(_) => ErrorKind::InvalidOptions,
            Error::FileConflict(_) => ErrorKind::FileConflict,
            Error::LockedFileAbort(_) => ErrorKind::LockedFileAbort,
            Error::LinkCreation(_) => ErrorKind::LinkCreationError,
            Error::RegistryUpdate(_) => ErrorKind::RegistryUpdateError,
            Error::OperationNotFound(_) => ErrorKind::OperationNotFound,
            Error::AlreadyRolledBack(_) => ErrorKind::AlreadyRolledBack,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) | Error::Json(_) | Error::Other(_) => ErrorKind::Unexpected,
        }
    }
}

/// Serializable failure class carried by migration and rollback results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PlanningError,
    InsufficientSpace,
    InvalidOptions,
    FileConflict,
    LockedFileAbort,
    LinkCreationError,
    RegistryUpdateError,
    OperationNotFound,
    AlreadyRolledBack,
    InvalidState,
    Cancelled,
    Unexpected,
}
