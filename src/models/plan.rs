//! Migration plan data model.

use super::link::LinkType;
use super::software::SoftwareEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Plan file structure.
///
/// Produced by the planner and consumed once by the executor. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Unique plan ID.
    pub id: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Software being moved.
    pub software: SoftwareEntry,
    /// Original install directory.
    pub source_path: PathBuf,
    /// New install directory (target base + rendered name).
    pub target_path: PathBuf,
    /// One entry per file under the source tree, in copy order.
    pub file_operations: Vec<FileMoveOperation>,
    /// Target directories to mirror, parents before children.
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Sum of all file operation sizes.
    pub total_size_bytes: u64,
    /// Free space at the target volume when planned.
    pub available_space_bytes: u64,
    /// Link type suggested for this host.
    pub recommended_link_type: LinkType,
}

/// A single file copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMoveOperation {
    /// Source file.
    pub source_path: PathBuf,
    /// Destination file.
    pub target_path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
}

impl MigrationPlan {
    /// Check the plan's internal invariants.
    pub fn validate(&self) -> crate::Result<()> {
        let sum: u64 = self.file_operations.iter().map(|op| op.size_bytes).sum();
        if sum != self.total_size_bytes {
            return Err(crate::Error::Planning(format!(
                "total size {} does not match sum of file operations {}",
                self.total_size_bytes, sum
            )));
        }

        for op in &self.file_operations {
            if !op.target_path.starts_with(&self.target_path) {
                return Err(crate::Error::Planning(format!(
                    "file target outside plan target: {}",
                    op.target_path.display()
                )));
            }
        }

        Ok(())
    }

    /// Whether the target volume can hold the plan.
    pub fn fits(&self) -> bool {
        self.total_size_bytes <= self.available_space_bytes
    }
}
