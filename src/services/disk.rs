//! Free space lookup for target volumes.

use crate::utils::fs::strip_verbatim;
use crate::Result;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Reports free space on the volume holding a path.
pub trait SpaceProbe: Send + Sync {
    /// Available bytes for `path`, which need not exist yet.
    fn available_space(&self, path: &Path) -> Result<u64>;
}

/// Probe backed by the host's mounted disks.
#[derive(Debug, Default, Clone)]
pub struct DiskSpaceProbe;

impl SpaceProbe for DiskSpaceProbe {
    fn available_space(&self, path: &Path) -> Result<u64> {
        let existing = nearest_existing_ancestor(path)
            .ok_or_else(|| crate::Error::PathNotFound(path.display().to_string()))?;
        let resolved = strip_verbatim(existing.canonicalize()?);

        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .iter()
            .filter(|d| resolved.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().components().count())
            .ok_or_else(|| {
                crate::Error::Planning(format!("no mounted volume found for {}", resolved.display()))
            })?;

        tracing::debug!(
            "Volume {:?} at {:?}: {} bytes available",
            disk.name(),
            disk.mount_point(),
            disk.available_space()
        );
        Ok(disk.available_space())
    }
}

/// Probe returning a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpaceProbe(pub u64);

impl SpaceProbe for FixedSpaceProbe {
    fn available_space(&self, _path: &Path) -> Result<u64> {
        Ok(self.0)
    }
}

fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors().find(|p| p.exists()).map(Path::to_path_buf)
}
