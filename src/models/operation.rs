//! Operation record data model.
//!
//! An operation record is the durable audit and rollback unit of one
//! migration. Actions are kept in execution order; rollback walks them in
//! reverse.

use super::link::LinkType;
use super::registry::RegistryValueType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted operation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Record ID.
    pub id: String,
    /// Operation type.
    pub op_type: OperationType,
    /// Human readable summary.
    pub description: String,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// End timestamp, set on finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Outcome, set on finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// For rollback records, the operation that was reversed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_of: Option<String>,
    /// Steps performed (in execution order).
    pub actions: Vec<OperationAction>,
}

impl OperationRecord {
    /// Whether the record was closed by its producer.
    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some() && self.success.is_some()
    }
}

/// Operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Migration,
    Cleanup,
    RegistryUpdate,
    Rollback,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationType::Migration => "migration",
            OperationType::Cleanup => "cleanup",
            OperationType::RegistryUpdate => "registry_update",
            OperationType::Rollback => "rollback",
        };
        write!(f, "{}", s)
    }
}

/// A single recorded step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationAction {
    /// What was done.
    pub kind: ActionKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Value/path before the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    /// Value/path after the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    pub can_rollback: bool,
}

impl OperationAction {
    pub fn new(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            timestamp: Utc::now(),
            original_value: None,
            new_value: None,
            can_rollback: false,
        }
    }

    pub fn values(mut self, original: impl Into<String>, new: impl Into<String>) -> Self {
        self.original_value = Some(original.into());
        self.new_value = Some(new.into());
        self
    }

    pub fn new_value(mut self, new: impl Into<String>) -> Self {
        self.new_value = Some(new.into());
        self
    }

    pub fn reversible(mut self) -> Self {
        self.can_rollback = true;
        self
    }
}

/// Action type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// File copied: original = source file, new = destination file.
    CopyFile,
    /// Target directory created: new = directory.
    CreateDirectory,
    /// Source directory renamed aside: original = source, new = staging dir.
    StageSource,
    /// Link placed at the source: original = source, new = target.
    CreateLink { link_type: LinkType },
    /// Released staged file was a symbolic link: original = source file, new = link target.
    FileLink,
    /// Staging directory removed after all files were migrated.
    DiscardStaging,
    /// Staging directory kept because it still holds unmigrated files.
    KeepLeftovers,
    /// Registry value rewritten: original/new = full value data.
    UpdateRegistryValue {
        key_path: String,
        value_name: String,
        value_type: RegistryValueType,
    },
    /// Rollback step (informational).
    Revert,
}

/// Accumulates a record while an operation runs.
///
/// The builder is the only place actions are appended; `finalize` consumes it
/// so a record is closed exactly once.
#[derive(Debug)]
pub struct OperationRecordBuilder {
    record: OperationRecord,
}

impl OperationRecordBuilder {
    pub fn new(op_type: OperationType, description: impl Into<String>) -> Self {
        Self {
            record: OperationRecord {
                id: Uuid::new_v4().to_string(),
                op_type,
                description: description.into(),
                started_at: Utc::now(),
                ended_at: None,
                success: None,
                rollback_of: None,
                actions: Vec::new(),
            },
        }
    }

    pub fn rollback_of(mut self, operation_id: impl Into<String>) -> Self {
        self.record.rollback_of = Some(operation_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn push(&mut self, action: OperationAction) {
        self.record.actions.push(action);
    }

    pub fn action_count(&self) -> usize {
        self.record.actions.len()
    }

    /// Current in-progress view of the record.
    pub fn snapshot(&self) -> &OperationRecord {
        &self.record
    }

    pub fn finalize(mut self, success: bool) -> OperationRecord {
        self.record.ended_at = Some(Utc::now());
        self.record.success = Some(success);
        self.record
    }
}
