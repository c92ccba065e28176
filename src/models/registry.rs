//! Registry reference data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registry value that may reference an install path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryReference {
    /// Full key path including hive, e.g. `HKLM\SOFTWARE\Vendor\App`.
    pub key_path: String,
    /// Value name (empty for the default value).
    pub value_name: String,
    /// Value data. Multi-strings are joined with `\n`.
    pub value_data: String,
    pub value_type: RegistryValueType,
}

impl RegistryReference {
    pub fn new(
        key_path: impl Into<String>,
        value_name: impl Into<String>,
        value_data: impl Into<String>,
        value_type: RegistryValueType,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            value_name: value_name.into(),
            value_data: value_data.into(),
            value_type,
        }
    }

    /// Same value location carrying different data.
    pub fn with_data(&self, value_data: impl Into<String>) -> Self {
        Self {
            value_data: value_data.into(),
            ..self.clone()
        }
    }

    pub fn location(&self) -> String {
        format!("{}\\{}", self.key_path, self.value_name)
    }
}

/// Registry value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryValueType {
    String,
    ExpandString,
    MultiString,
    Binary,
    DWord,
    QWord,
}

impl RegistryValueType {
    /// Only textual values can carry a path.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            RegistryValueType::String | RegistryValueType::ExpandString | RegistryValueType::MultiString
        )
    }
}

/// Aggregate outcome of a batch of registry writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryUpdateResult {
    pub success: bool,
    pub updated_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub report: RegistryUpdateReport,
}

/// Per-entry log of a registry batch, sufficient to undo it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryUpdateReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    pub old_path: String,
    pub new_path: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<RegistryUpdateEntry>,
}

/// One rewritten value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryUpdateEntry {
    pub key_path: String,
    pub value_name: String,
    pub value_type: RegistryValueType,
    pub old_value: String,
    pub new_value: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegistryUpdateEntry {
    pub fn reference_before(&self) -> RegistryReference {
        RegistryReference::new(&self.key_path, &self.value_name, &self.old_value, self.value_type)
    }

    pub fn reference_after(&self) -> RegistryReference {
        RegistryReference::new(&self.key_path, &self.value_name, &self.new_value, self.value_type)
    }
}

/// Snapshot of matched values taken before the first write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryBackup {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub values: Vec<RegistryReference>,
}
