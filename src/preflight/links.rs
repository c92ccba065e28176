//! Link privilege check.

use super::CheckResult;
use crate::core::link::can_create_symlinks;

/// Report which link types this process can create. Junctions never need
/// elevation, so a missing symlink privilege only degrades the check.
pub fn check(elevated: Option<bool>) -> CheckResult {
    if elevated.unwrap_or_else(can_create_symlinks) {
        CheckResult::passed("Links", "junctions and symbolic links available")
    } else {
        CheckResult::degraded(
            "Links",
            "junctions only",
            "Run elevated or enable Developer Mode to use --link-type symlink",
        )
    }
}
