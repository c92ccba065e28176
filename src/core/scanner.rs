//! Source tree scanner.
//!
//! Enumerates every file and directory under an install path. Symbolic links
//! are followed so linked content is copied as real data; links that loop
//! back to an ancestor are detected and skipped.

use crate::models::software::{DirectoryKind, RelatedDirectory, SoftwareEntry};
use crate::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A regular file found under the source root.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// Result of scanning a source tree.
#[derive(Debug, Default)]
pub struct SourceScan {
    /// Files in walk order (sorted by name within each directory).
    pub files: Vec<ScannedFile>,
    /// Subdirectories relative to the root, parents before children.
    pub directories: Vec<PathBuf>,
    /// Link entries skipped because they loop back to an ancestor.
    pub skipped_loops: Vec<PathBuf>,
    /// Sum of file sizes.
    pub total_size: u64,
}

/// Scan a source directory.
pub fn scan_source(root: &Path) -> Result<SourceScan> {
    if !root.exists() {
        return Err(crate::Error::Planning(format!(
            "source path does not exist: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(crate::Error::Planning(format!(
            "source path is not a directory: {}",
            root.display()
        )));
    }

    let mut result = SourceScan::default();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(ancestor) = e.loop_ancestor() {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    tracing::warn!("Skipping link loop {:?} -> {:?}", path, ancestor);
                    result.skipped_loops.push(path);
                    continue;
                }
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                return Err(crate::Error::Planning(format!("cannot read {}: {}", path, e)));
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .map_err(|e| crate::Error::Planning(e.to_string()))?;

        if entry.file_type().is_dir() {
            result.directories.push(relative);
        } else if entry.file_type().is_file() {
            let size = entry
                .metadata()
                .map_err(|e| crate::Error::Planning(format!("cannot stat {}: {}", entry.path().display(), e)))?
                .len();
            result.total_size += size;
            result.files.push(ScannedFile {
                path: entry.path().to_path_buf(),
                relative,
                size,
            });
        } else {
            // Dangling links and special files have no content to carry.
            tracing::warn!("Skipping non-regular entry {:?}", entry.path());
        }
    }

    tracing::info!(
        "Scanned {:?}: {} files in {} directories, {} bytes",
        root,
        result.files.len(),
        result.directories.len(),
        result.total_size
    );

    Ok(result)
}

/// Build a software entry for a bare directory.
pub fn entry_from_directory(path: &Path) -> Result<SoftwareEntry> {
    crate::utils::fs::ensure_directory(path)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| crate::Error::Planning(format!("cannot name {}", path.display())))?;
    let size = crate::utils::fs::dir_size(path);

    let mut entry = SoftwareEntry::new(name.to_lowercase().replace(' ', "-"), name, path);
    entry.total_size = size;
    entry.related_directories = vec![RelatedDirectory {
        path: path.to_path_buf(),
        kind: DirectoryKind::Install,
        size_bytes: size,
    }];
    Ok(entry)
}
