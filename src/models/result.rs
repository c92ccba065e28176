//! Terminal results returned to the host.

use super::progress::MigrationState;
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    /// Terminal executor state.
    pub state: MigrationState,
    /// Set only if an operation record was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub migrated_files: Vec<PathBuf>,
    pub skipped_files: Vec<PathBuf>,
    pub failed_files: Vec<PathBuf>,
    /// Directory holding source files that were not migrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leftover_path: Option<PathBuf>,
    /// Registry values rewritten.
    pub registry_updated: usize,
    /// Registry values that could not be rewritten.
    pub registry_failed: usize,
}

impl MigrationResult {
    pub(crate) fn new() -> Self {
        Self {
            success: false,
            state: MigrationState::NotStarted,
            operation_id: None,
            error_kind: None,
            error_message: None,
            migrated_files: Vec::new(),
            skipped_files: Vec::new(),
            failed_files: Vec::new(),
            leftover_path: None,
            registry_updated: 0,
            registry_failed: 0,
        }
    }

    /// Failed result without any recorded work.
    pub(crate) fn rejected(error: &crate::Error) -> Self {
        let mut result = Self::new();
        result.state = MigrationState::Failed;
        result.error_kind = Some(error.kind());
        result.error_message = Some(error.to_string());
        result
    }
}

/// Result of one rollback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    /// Operation that was rolled back.
    pub target_operation_id: String,
    /// Record of this rollback, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Actions reversed.
    pub reverted_actions: usize,
    /// Paths or values that could not be restored.
    pub failed_files: Vec<String>,
}

impl RollbackResult {
    pub(crate) fn rejected(target_operation_id: &str, error: &crate::Error) -> Self {
        Self {
            success: false,
            target_operation_id: target_operation_id.to_string(),
            error_kind: Some(error.kind()),
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }
}
