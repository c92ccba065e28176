//! Filesystem link data model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of link left at the original install path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Directory junction. No elevation, local volumes only.
    #[default]
    Junction,
    /// Symbolic link. May need elevation, supports remote targets.
    SymbolicLink,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkType::Junction => write!(f, "junction"),
            LinkType::SymbolicLink => write!(f, "symlink"),
        }
    }
}

impl std::str::FromStr for LinkType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "junction" => Ok(LinkType::Junction),
            "symlink" | "symbolic_link" | "symboliclink" => Ok(LinkType::SymbolicLink),
            other => Err(crate::Error::Config(format!("unknown link type: {}", other))),
        }
    }
}

/// Outcome of a link creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub link_path: PathBuf,
    pub target_path: PathBuf,
    pub link_type: LinkType,
}

impl LinkResult {
    pub(crate) fn ok(link_path: PathBuf, target_path: PathBuf, link_type: LinkType) -> Self {
        Self {
            success: true,
            error_message: None,
            link_path,
            target_path,
            link_type,
        }
    }

    pub(crate) fn fail(
        link_path: PathBuf,
        target_path: PathBuf,
        link_type: LinkType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            link_path,
            target_path,
            link_type,
        }
    }
}

/// An existing link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub link_path: PathBuf,
    pub target_path: PathBuf,
    pub link_type: LinkType,
    /// False when the link dangles.
    pub target_exists: bool,
}
