//! Configuration model.

use super::link::LinkType;
use super::options::{ConflictPolicy, LockedFilePolicy, MigrationOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory new install locations are created under.
    pub default_target_path: Option<PathBuf>,
    /// Link type used when the caller does not choose one.
    pub preferred_link_type: Option<LinkType>,
    /// Rewrite registry values pointing at the old path.
    pub auto_update_registry: bool,
    /// Compare checksums after copying.
    pub verify_integrity: bool,
    /// Naming template for the target directory.
    pub naming_template: String,
    /// Operation records directory.
    pub operations_dir: PathBuf,
    /// Registry snapshot directory.
    pub registry_backup_dir: PathBuf,
    /// Registry keys scanned for path references.
    pub registry_search_keys: Vec<String>,
    /// Known elevation capability. Probed once when the engine is built if unset.
    pub elevated: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path();
        Self {
            default_target_path: None,
            preferred_link_type: None,
            auto_update_registry: true,
            verify_integrity: true,
            naming_template: "{Name}".to_string(),
            operations_dir: data_dir.join("operations"),
            registry_backup_dir: data_dir.join("registry_backups"),
            registry_search_keys: vec![
                r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall".to_string(),
                r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall".to_string(),
                r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall".to_string(),
                r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths".to_string(),
                r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Run".to_string(),
            ],
            elevated: None,
        }
    }
}

impl Config {
    /// Default options for an execution.
    pub fn migration_options(&self, recommended: LinkType) -> MigrationOptions {
        MigrationOptions {
            link_type: self.preferred_link_type.unwrap_or(recommended),
            update_registry: self.auto_update_registry,
            verify_integrity: self.verify_integrity,
            on_file_conflict: ConflictPolicy::Skip,
            on_locked_file: LockedFilePolicy::Skip,
        }
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("app_relocator")
}

/// Get the data directory path.
fn dirs_data_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("app_relocator")
}

/// Default configuration file location.
pub fn config_path() -> PathBuf {
    dirs_config_path().join("config.toml")
}

/// Load configuration from file.
pub fn load_config() -> Config {
    let config_path = config_path();

    if config_path.exists() {
        match load_config_from(&config_path) {
            Ok(config) => return config,
            Err(e) => tracing::warn!("Ignoring config {:?}: {}", config_path, e),
        }
    }

    Config::default()
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "preferred_link_type = \"symbolic_link\"\nauto_update_registry = false\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.preferred_link_type, Some(LinkType::SymbolicLink));
        assert!(!config.auto_update_registry);
        assert!(config.verify_integrity);
        assert_eq!(config.naming_template, "{Name}");

        let options = config.migration_options(LinkType::Junction);
        assert_eq!(options.link_type, LinkType::SymbolicLink);
        assert!(!options.update_registry);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "auto_update_registry = \"maybe\"").unwrap();
        assert!(matches!(load_config_from(&path), Err(crate::Error::Config(_))));
    }
}
