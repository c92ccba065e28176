//! Link manager.
//!
//! Creates, inspects and removes the link that makes a relocated directory
//! appear at its original path. On Windows a junction or a symbolic link is
//! created as requested; elsewhere both kinds are realised as symbolic links.
//! A failed creation never falls back to the other kind.

use crate::models::link::{LinkInfo, LinkResult, LinkType};
use crate::utils::fs::strip_verbatim;
use std::fs;
use std::io;
use std::path::Path;
use uuid::Uuid;

/// Link manager.
#[derive(Debug, Default, Clone)]
pub struct LinkManager;

impl LinkManager {
    pub fn new() -> Self {
        Self
    }

    /// Create a link at `link_path` pointing to `target_path`.
    pub fn create_link(&self, link_path: &Path, target_path: &Path, link_type: LinkType) -> LinkResult {
        let fail = |msg: String| {
            tracing::warn!("Link creation failed: {}", msg);
            LinkResult::fail(link_path.to_path_buf(), target_path.to_path_buf(), link_type, msg)
        };

        let target_meta = match fs::metadata(target_path) {
            Ok(meta) => meta,
            Err(_) => return fail(format!("target does not exist: {}", target_path.display())),
        };
        if link_type == LinkType::Junction && !target_meta.is_dir() {
            return fail(format!("junction target is not a directory: {}", target_path.display()));
        }

        if fs::symlink_metadata(link_path).is_ok() {
            match self.get_link_info(link_path) {
                Some(info) if info.link_type == realized_type(link_type) => {
                    tracing::debug!("Replacing existing {} at {:?}", link_type, link_path);
                    if !self.remove_link(link_path) {
                        return fail(format!("cannot replace existing link: {}", link_path.display()));
                    }
                }
                _ => return fail(format!("link path already exists: {}", link_path.display())),
            }
        }

        if let Some(parent) = link_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return fail(format!("link parent does not exist: {}", parent.display()));
            }
        }

        match platform::create(link_path, target_path, link_type, target_meta.is_dir()) {
            Ok(()) => {
                tracing::debug!("Created {}: {:?} -> {:?}", link_type, link_path, target_path);
                LinkResult::ok(link_path.to_path_buf(), target_path.to_path_buf(), link_type)
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied || is_privilege_error(&e) => fail(format!(
                "insufficient privilege to create {} at {}: {}",
                link_type,
                link_path.display(),
                e
            )),
            Err(e) => fail(format!("{}: {}", link_path.display(), e)),
        }
    }

    /// Inspect `path`. `None` when it is not a link.
    pub fn get_link_info(&self, path: &Path) -> Option<LinkInfo> {
        let meta = fs::symlink_metadata(path).ok()?;
        if !meta.file_type().is_symlink() {
            return None;
        }

        let raw = fs::read_link(path).ok()?;
        let target = if raw.is_relative() {
            path.parent().map(|p| p.join(&raw)).unwrap_or(raw)
        } else {
            strip_verbatim(raw)
        };

        Some(LinkInfo {
            link_path: path.to_path_buf(),
            target_exists: fs::metadata(path).is_ok(),
            link_type: platform::link_type(path),
            target_path: target,
        })
    }

    /// Recreate a file symbolic link at `link_path`. `target` is stored as given.
    pub fn create_file_link(&self, link_path: &Path, target: &Path) -> io::Result<()> {
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        platform::create(link_path, target, LinkType::SymbolicLink, false)?;
        tracing::debug!("Recreated file link {:?} -> {:?}", link_path, target);
        Ok(())
    }

    /// Remove the link at `path`, never its target. False if `path` is not a link.
    pub fn remove_link(&self, path: &Path) -> bool {
        if self.get_link_info(path).is_none() {
            return false;
        }
        match fs::remove_file(path).or_else(|_| fs::remove_dir(path)) {
            Ok(()) => {
                tracing::debug!("Removed link {:?}", path);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to remove link {:?}: {}", path, e);
                false
            }
        }
    }
}

/// Link type `get_link_info` reports for a link created as `requested`.
pub fn realized_type(requested: LinkType) -> LinkType {
    if cfg!(windows) {
        requested
    } else {
        LinkType::SymbolicLink
    }
}

/// Whether this process may create symbolic links.
pub fn can_create_symlinks() -> bool {
    let probe = std::env::temp_dir().join(format!("app_relocator_probe_{}", Uuid::new_v4()));
    let target = probe.join("target");
    let link = probe.join("link");

    let result = fs::create_dir_all(&target)
        .and_then(|_| platform::create(&link, &target, LinkType::SymbolicLink, true));
    let allowed = result.is_ok();

    let _ = fs::remove_dir(&link).or_else(|_| fs::remove_file(&link));
    let _ = fs::remove_dir_all(&probe);
    allowed
}

fn is_privilege_error(err: &io::Error) -> bool {
    // ERROR_PRIVILEGE_NOT_HELD
    err.raw_os_error() == Some(1314)
}

#[cfg(unix)]
mod platform {
    use crate::models::link::LinkType;
    use std::io;
    use std::path::Path;

    pub fn create(link: &Path, target: &Path, _link_type: LinkType, _target_is_dir: bool) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    pub fn link_type(_path: &Path) -> LinkType {
        LinkType::SymbolicLink
    }
}

#[cfg(windows)]
mod platform {
    use crate::models::link::LinkType;
    use std::io;
    use std::path::Path;

    pub fn create(link: &Path, target: &Path, link_type: LinkType, target_is_dir: bool) -> io::Result<()> {
        match link_type {
            LinkType::Junction => junction::create(target, link),
            LinkType::SymbolicLink if target_is_dir => std::os::windows::fs::symlink_dir(target, link),
            LinkType::SymbolicLink => std::os::windows::fs::symlink_file(target, link),
        }
    }

    /// Junctions carry the mount point reparse tag; anything else is a symlink.
    pub fn link_type(path: &Path) -> LinkType {
        match junction::exists(path) {
            Ok(true) => LinkType::Junction,
            _ => LinkType::SymbolicLink,
        }
    }
}
