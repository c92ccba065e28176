//! Registry reference updater.
//!
//! Rewrites registry values that point into a relocated directory. Every batch
//! snapshots the values it is about to touch before the first write, and a
//! single failed value never stops the rest of the batch.

use crate::models::registry::{
    RegistryBackup, RegistryReference, RegistryUpdateEntry, RegistryUpdateReport, RegistryUpdateResult,
};
use crate::services::registry::RegistryStore;
use crate::Result;
use chrono::Utc;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Replace every occurrence of `old` in `haystack` with `new`.
///
/// Matching is case-insensitive and respects path boundaries: `C:\App` matches
/// `C:\App\bin` and `"C:\App"` but not `C:\Apple`. Returns `None` when nothing
/// matched.
pub fn replace_path(haystack: &str, old: &str, new: &str) -> Option<String> {
    let old = old.trim_end_matches(|c| c == '\\' || c == '/');
    let new = new.trim_end_matches(|c| c == '\\' || c == '/');
    if old.is_empty() {
        return None;
    }

    let pattern = format!(r#"(?i){}(?P<tail>$|[\\/";,\s])"#, regex::escape(old));
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(haystack) {
        return None;
    }
    let replaced = re.replace_all(haystack, |caps: &Captures| format!("{}{}", new, &caps["tail"]));
    Some(replaced.into_owned())
}

/// Registry reference updater.
pub struct RegistryUpdater {
    store: Arc<dyn RegistryStore>,
    backup_dir: PathBuf,
}

impl RegistryUpdater {
    pub fn new(store: Arc<dyn RegistryStore>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Values that reference `path` on a path boundary.
    pub fn find_references(&self, path: &Path) -> Result<Vec<RegistryReference>> {
        let needle = path.to_string_lossy();
        let needle = needle.trim_end_matches(|c| c == '\\' || c == '/');
        let found = self.store.find_references(needle)?;
        Ok(found
            .into_iter()
            .filter(|r| replace_path(&r.value_data, needle, needle).is_some())
            .collect())
    }

    /// Rewrite `old_path` to `new_path` in every given reference.
    pub fn update_references(
        &self,
        old_path: &Path,
        new_path: &Path,
        references: &[RegistryReference],
    ) -> RegistryUpdateResult {
        let old = old_path.to_string_lossy().to_string();
        let new = new_path.to_string_lossy().to_string();

        let planned: Vec<(&RegistryReference, String)> = references
            .iter()
            .filter(|r| r.value_type.is_textual())
            .filter_map(|r| replace_path(&r.value_data, &old, &new).map(|data| (r, data)))
            .filter(|(r, data)| *data != r.value_data)
            .collect();

        let mut report = RegistryUpdateReport {
            backup_id: None,
            old_path: old.clone(),
            new_path: new.clone(),
            created_at: Utc::now(),
            entries: Vec::new(),
        };

        if planned.is_empty() {
            tracing::info!("No registry values reference {}", old);
            return summarize(report, None);
        }

        let snapshot: Vec<RegistryReference> = planned.iter().map(|(r, _)| (*r).clone()).collect();
        let backup_id = match self.save_backup(&snapshot) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Registry backup failed, no values written: {}", e);
                report.entries = planned
                    .iter()
                    .map(|(r, data)| entry(r, data, Some(format!("backup failed: {}", e))))
                    .collect();
                return summarize(report, None);
            }
        };
        report.backup_id = Some(backup_id.clone());

        for (reference, data) in planned {
            let error = match self.store.write_value(&reference.with_data(data.as_str())) {
                Ok(()) => {
                    tracing::debug!("Updated {}", reference.location());
                    None
                }
                Err(e) => {
                    tracing::warn!("Failed to update {}: {}", reference.location(), e);
                    Some(e.to_string())
                }
            };
            report.entries.push(entry(reference, &data, error));
        }

        summarize(report, Some(backup_id))
    }

    /// Undo a previous batch by writing back each successfully changed value.
    pub fn rollback(&self, report: &RegistryUpdateReport) -> RegistryUpdateResult {
        let mut reverse = RegistryUpdateReport {
            backup_id: report.backup_id.clone(),
            old_path: report.new_path.clone(),
            new_path: report.old_path.clone(),
            created_at: Utc::now(),
            entries: Vec::new(),
        };

        for done in report.entries.iter().filter(|e| e.success) {
            let before = done.reference_before();
            let error = self.restore_value(&before).err().map(|e| e.to_string());
            reverse.entries.push(RegistryUpdateEntry {
                old_value: done.new_value.clone(),
                new_value: done.old_value.clone(),
                success: error.is_none(),
                error,
                ..done.clone()
            });
        }

        let backup_id = report.backup_id.clone();
        summarize(reverse, backup_id)
    }

    /// Write a reference's data back verbatim.
    pub fn restore_value(&self, reference: &RegistryReference) -> Result<()> {
        self.store.write_value(reference).map_err(|e| {
            crate::Error::RegistryUpdate(format!("cannot restore {}: {}", reference.location(), e))
        })?;
        tracing::debug!("Restored {}", reference.location());
        Ok(())
    }

    /// Revert every value captured in a backup snapshot.
    pub fn restore_backup(&self, backup_id: &str) -> Result<RegistryUpdateResult> {
        let backup = self.load_backup(backup_id)?;
        let mut report = RegistryUpdateReport {
            backup_id: Some(backup.id.clone()),
            old_path: String::new(),
            new_path: String::new(),
            created_at: Utc::now(),
            entries: Vec::new(),
        };

        for value in &backup.values {
            let error = self.restore_value(value).err().map(|e| e.to_string());
            report.entries.push(RegistryUpdateEntry {
                key_path: value.key_path.clone(),
                value_name: value.value_name.clone(),
                value_type: value.value_type,
                old_value: String::new(),
                new_value: value.value_data.clone(),
                success: error.is_none(),
                error,
            });
        }

        Ok(summarize(report, Some(backup.id)))
    }

    pub fn load_backup(&self, backup_id: &str) -> Result<RegistryBackup> {
        let path = self.backup_path(backup_id)?;
        if !path.exists() {
            return Err(crate::Error::RegistryUpdate(format!("backup not found: {}", backup_id)));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_backup(&self, values: &[RegistryReference]) -> Result<String> {
        let backup = RegistryBackup {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            values: values.to_vec(),
        };

        fs::create_dir_all(&self.backup_dir)?;
        let path = self.backup_path(&backup.id)?;
        fs::write(&path, serde_json::to_string_pretty(&backup)?)?;

        tracing::info!("Registry backup {} saved to {:?}", backup.id, path);
        Ok(backup.id)
    }

    fn backup_path(&self, backup_id: &str) -> Result<PathBuf> {
        if backup_id.is_empty() || !backup_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::RegistryUpdate(format!("invalid backup id: {}", backup_id)));
        }
        Ok(self.backup_dir.join(format!("{}.json", backup_id)))
    }
}

fn entry(reference: &RegistryReference, new_value: &str, error: Option<String>) -> RegistryUpdateEntry {
    RegistryUpdateEntry {
        key_path: reference.key_path.clone(),
        value_name: reference.value_name.clone(),
        value_type: reference.value_type,
        old_value: reference.value_data.clone(),
        new_value: new_value.to_string(),
        success: error.is_none(),
        error,
    }
}

fn summarize(report: RegistryUpdateReport, backup_id: Option<String>) -> RegistryUpdateResult {
    let updated_count = report.entries.iter().filter(|e| e.success).count();
    let failed_count = report.entries.len() - updated_count;
    let error_message = (failed_count > 0).then(|| {
        format!(
            "{} of {} registry values could not be written",
            failed_count,
            report.entries.len()
        )
    });

    RegistryUpdateResult {
        success: failed_count == 0,
        updated_count,
        failed_count,
        backup_id,
        error_message,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::RegistryValueType;
    use crate::services::registry::MemoryRegistry;
    use tempfile::TempDir;

    const KEY: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\App";

    fn sample_registry() -> Arc<MemoryRegistry> {
        Arc::new(MemoryRegistry::with_values([
            RegistryReference::new(KEY, "InstallLocation", r"C:\App", RegistryValueType::String),
            RegistryReference::new(KEY, "DisplayIcon", r#""c:\app\bin\app.exe",0"#, RegistryValueType::String),
            RegistryReference::new(KEY, "UninstallString", r"C:\Apple\uninst.exe", RegistryValueType::String),
        ]))
    }

    #[test]
    fn test_replace_path_boundaries() {
        assert_eq!(replace_path(r"C:\App", r"C:\App", r"D:\Software\App").unwrap(), r"D:\Software\App");
        assert_eq!(
            replace_path(r"c:\APP\bin\app.exe", r"C:\App", r"D:\App").unwrap(),
            r"D:\App\bin\app.exe"
        );
        assert_eq!(
            replace_path(r"C:\App;C:\App\lib", r"C:\App\", r"D:\App").unwrap(),
            r"D:\App;D:\App\lib"
        );
        assert!(replace_path(r"C:\Apple\x.exe", r"C:\App", r"D:\App").is_none());
        assert_eq!(replace_path(r"C:\$App", r"C:\$App", r"D:\$1").unwrap(), r"D:\$1");
    }

    #[test]
    fn test_update_references_writes_backup_and_values() {
        let temp_dir = TempDir::new().unwrap();
        let registry = sample_registry();
        let updater = RegistryUpdater::new(registry.clone(), temp_dir.path());

        let refs = updater.find_references(Path::new(r"C:\App")).unwrap();
        assert_eq!(refs.len(), 2);

        let result = updater.update_references(Path::new(r"C:\App"), Path::new(r"D:\Software\App"), &refs);
        assert!(result.success);
        assert_eq!(result.updated_count, 2);
        assert_eq!(result.failed_count, 0);

        let backup_id = result.backup_id.clone().unwrap();
        assert!(temp_dir.path().join(format!("{}.json", backup_id)).exists());
        assert_eq!(registry.get(KEY, "InstallLocation").unwrap().value_data, r"D:\Software\App");
        assert_eq!(
            registry.get(KEY, "DisplayIcon").unwrap().value_data,
            r#""D:\Software\App\bin\app.exe",0"#
        );
        assert_eq!(registry.get(KEY, "UninstallString").unwrap().value_data, r"C:\Apple\uninst.exe");
    }

    #[test]
    fn test_single_failure_does_not_stop_batch() {
        let temp_dir = TempDir::new().unwrap();
        let registry = sample_registry();
        registry.deny_writes(KEY, "InstallLocation");
        let updater = RegistryUpdater::new(registry.clone(), temp_dir.path());

        let refs = updater.find_references(Path::new(r"C:\App")).unwrap();
        let result = updater.update_references(Path::new(r"C:\App"), Path::new(r"D:\App"), &refs);
        assert!(!result.success);
        assert_eq!(result.updated_count, 1);
        assert_eq!(result.failed_count, 1);
        assert!(result.error_message.is_some());
        assert_eq!(registry.get(KEY, "InstallLocation").unwrap().value_data, r"C:\App");
    }

    #[test]
    fn test_rollback_and_restore_backup() {
        let temp_dir = TempDir::new().unwrap();
        let registry = sample_registry();
        let updater = RegistryUpdater::new(registry.clone(), temp_dir.path());

        let refs = updater.find_references(Path::new(r"C:\App")).unwrap();
        let result = updater.update_references(Path::new(r"C:\App"), Path::new(r"D:\App"), &refs);

        let undo = updater.rollback(&result.report);
        assert!(undo.success);
        assert_eq!(undo.updated_count, 2);
        assert_eq!(registry.get(KEY, "InstallLocation").unwrap().value_data, r"C:\App");

        updater.update_references(Path::new(r"C:\App"), Path::new(r"E:\App"), &refs);
        let restored = updater.restore_backup(result.backup_id.as_deref().unwrap()).unwrap();
        assert_eq!(restored.updated_count, 2);
        assert_eq!(
            registry.get(KEY, "DisplayIcon").unwrap().value_data,
            r#""c:\app\bin\app.exe",0"#
        );
    }

    #[test]
    fn test_no_matches_needs_no_backup() {
        let temp_dir = TempDir::new().unwrap();
        let updater = RegistryUpdater::new(sample_registry(), temp_dir.path().join("backups"));
        let result = updater.update_references(Path::new(r"C:\Nothing"), Path::new(r"D:\Nothing"), &[]);
        assert!(result.success);
        assert!(result.backup_id.is_none());
        assert!(!temp_dir.path().join("backups").exists());
    }
}
