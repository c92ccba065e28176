//! Registry backend check.

use super::CheckResult;
use crate::models::config::Config;

#[cfg(windows)]
pub fn check(config: &Config) -> CheckResult {
    use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ};
    use winreg::RegKey;

    let readable = config.registry_search_keys.iter().filter(|key| {
        let (hive, sub) = key.split_once('\\').unwrap_or((key.as_str(), ""));
        let predef = match hive.to_uppercase().as_str() {
            "HKLM" | "HKEY_LOCAL_MACHINE" => HKEY_LOCAL_MACHINE,
            "HKCU" | "HKEY_CURRENT_USER" => HKEY_CURRENT_USER,
            _ => return false,
        };
        RegKey::predef(predef).open_subkey_with_flags(sub, KEY_READ).is_ok()
    });
    let count = readable.count();

    if count > 0 {
        CheckResult::passed(
            "Registry",
            format!("{} of {} search keys readable", count, config.registry_search_keys.len()),
        )
    } else {
        CheckResult::failed(
            "Registry",
            "no registry search key could be opened",
            "Check registry_search_keys in config.toml or run with --no-registry",
        )
    }
}

#[cfg(not(windows))]
pub fn check(config: &Config) -> CheckResult {
    CheckResult::passed(
        "Registry",
        format!(
            "no system registry, {} search keys ignored",
            config.registry_search_keys.len()
        ),
    )
}
