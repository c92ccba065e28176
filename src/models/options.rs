//! Per-execution migration options.

use super::link::LinkType;
use serde::{Deserialize, Serialize};

/// Options supplied by the caller for one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    pub link_type: LinkType,
    pub update_registry: bool,
    pub verify_integrity: bool,
    pub on_file_conflict: ConflictPolicy,
    pub on_locked_file: LockedFilePolicy,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            link_type: LinkType::Junction,
            update_registry: true,
            verify_integrity: true,
            on_file_conflict: ConflictPolicy::Skip,
            on_locked_file: LockedFilePolicy::Skip,
        }
    }
}

impl MigrationOptions {
    /// Reject policies that need a human in the loop.
    ///
    /// The host must resolve `Ask` into a concrete policy before executing.
    pub fn validate(&self) -> crate::Result<()> {
        if self.on_file_conflict == ConflictPolicy::Ask {
            return Err(crate::Error::InvalidOptions(
                "on_file_conflict = ask must be resolved by the host before execution".to_string(),
            ));
        }
        if self.on_locked_file == LockedFilePolicy::Ask {
            return Err(crate::Error::InvalidOptions(
                "on_locked_file = ask must be resolved by the host before execution".to_string(),
            ));
        }
        Ok(())
    }
}

/// What to do when a destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    Ask,
    Skip,
    Overwrite,
    Rename,
}

/// What to do when a source file cannot be opened for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockedFilePolicy {
    Ask,
    Skip,
    Abort,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "ask" => Ok(ConflictPolicy::Ask),
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "rename" => Ok(ConflictPolicy::Rename),
            other => Err(crate::Error::Config(format!("unknown conflict policy: {}", other))),
        }
    }
}

impl std::str::FromStr for LockedFilePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "ask" => Ok(LockedFilePolicy::Ask),
            "skip" => Ok(LockedFilePolicy::Skip),
            "abort" => Ok(LockedFilePolicy::Abort),
            other => Err(crate::Error::Config(format!("unknown locked-file policy: {}", other))),
        }
    }
}
