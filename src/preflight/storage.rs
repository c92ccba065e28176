//! Writable directory check.

use super::CheckResult;
use std::fs;
use std::path::Path;

/// Check that `dir` exists (creating it if needed) and accepts writes.
pub fn check(dir: &Path, name: &'static str) -> CheckResult {
    let probe = dir.join(".write_probe");
    let result = fs::create_dir_all(dir)
        .and_then(|_| fs::write(&probe, b"probe"))
        .and_then(|_| fs::remove_file(&probe));

    match result {
        Ok(()) => CheckResult::passed(name, format!("writable ({})", dir.display())),
        Err(e) => CheckResult::failed(
            name,
            format!("{} is not writable: {}", dir.display(), e),
            "Set a writable directory in config.toml",
        ),
    }
}
