//! Installed software data model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A discovered software installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareEntry {
    /// Stable identifier assigned by discovery.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Version string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Publisher/vendor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Installation directory.
    pub install_path: PathBuf,
    /// Directories belonging to this installation.
    #[serde(default)]
    pub related_directories: Vec<RelatedDirectory>,
    /// Total size in bytes.
    pub total_size: u64,
    /// Main executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,
    /// Icon source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,
}

/// A directory related to an installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedDirectory {
    /// Directory path.
    pub path: PathBuf,
    /// What the directory holds.
    pub kind: DirectoryKind,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Role of a related directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    Install,
    Config,
    Cache,
    Log,
    Data,
    Temp,
}

impl std::fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DirectoryKind::Install => "install",
            DirectoryKind::Config => "config",
            DirectoryKind::Cache => "cache",
            DirectoryKind::Log => "log",
            DirectoryKind::Data => "data",
            DirectoryKind::Temp => "temp",
        };
        write!(f, "{}", s)
    }
}

impl SoftwareEntry {
    /// Create a minimal entry for an install directory.
    pub fn new(id: impl Into<String>, name: impl Into<String>, install_path: impl Into<PathBuf>) -> Self {
        let install_path = install_path.into();
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
            vendor: None,
            related_directories: vec![RelatedDirectory {
                path: install_path.clone(),
                kind: DirectoryKind::Install,
                size_bytes: 0,
            }],
            install_path,
            total_size: 0,
            executable_path: None,
            icon_path: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }
}
