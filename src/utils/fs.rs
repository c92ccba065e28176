//! File system utilities.

use crate::Result;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const COPY_CHUNK: usize = 1024 * 1024;

/// Check if a path exists and is a directory.
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(crate::Error::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// Check if a directory has no entries. Missing directories count as empty.
pub fn is_dir_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) => e.kind() == io::ErrorKind::NotFound,
    }
}

/// Whether an open failure means another process holds the file.
pub fn is_lock_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

/// Outcome of a chunked copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Copy finished; carries bytes written and source SHA-256.
    Complete { bytes: u64, sha256: String },
    /// Cancelled between chunks; the partial destination was removed.
    Cancelled,
}

/// Copy an already opened source into `to`, hashing the content on the way.
///
/// Data is written to a sibling temp file that replaces `to` only once the
/// copy is complete, so an existing destination survives an error or
/// cancellation. The temp file is always cleaned up.
pub fn copy_file_hashed(
    mut source: File,
    to: &Path,
    cancel: Option<&CancellationToken>,
    mut on_chunk: impl FnMut(u64),
) -> Result<CopyOutcome> {
    let partial = partial_path(to);
    let mut dest = File::create(&partial)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;

    let result: io::Result<bool> = (|| {
        loop {
            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                return Ok(false);
            }
            let n = source.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            dest.write_all(&buffer[..n])?;
            total += n as u64;
            on_chunk(n as u64);
        }
        dest.sync_all()?;
        Ok(true)
    })();
    drop(dest);

    match result.and_then(|done| if done { fs::rename(&partial, to).map(|_| true) } else { Ok(false) }) {
        Ok(true) => Ok(CopyOutcome::Complete {
            bytes: total,
            sha256: format!("{:x}", hasher.finalize()),
        }),
        Ok(false) => {
            remove_partial(&partial);
            Ok(CopyOutcome::Cancelled)
        }
        Err(e) => {
            remove_partial(&partial);
            Err(e.into())
        }
    }
}

/// Temp sibling a copy into `to` is written to.
fn partial_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    to.with_file_name(format!(".{}.partial", name))
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!("Failed to remove partial copy {:?}: {}", path, e);
    }
}

/// First non-existing sibling of `path`: `name (1).ext`, `name (2).ext`, ...
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Remove empty directories below and including `root`, deepest first.
pub fn prune_empty_dirs(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }

    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    for dir in dirs {
        if is_dir_empty(&dir) {
            fs::remove_dir(&dir)?;
        }
    }
    Ok(())
}

/// Drop the `\\?\` prefix Windows adds to canonical and link-target paths.
pub fn strip_verbatim(path: PathBuf) -> PathBuf {
    let stripped = path
        .to_string_lossy()
        .strip_prefix(r"\\?\")
        .filter(|rest| !rest.starts_with("UNC"))
        .map(PathBuf::from);
    stripped.unwrap_or(path)
}

/// Total size of all regular files under `path`.
pub fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
