//! Integration tests for file I/O operations.
//!
//! Tests cover:
//! - Plan save/load
//! - Config loading
//! - Operation log persistence
//! - Registry backups

use app_relocator::core::operation_log::{JsonOperationLog, OperationLog};
use app_relocator::core::planner::{load_plan, save_plan};
use app_relocator::core::registry::RegistryUpdater;
use app_relocator::models::config::load_config_from;
use app_relocator::models::link::LinkType;
use app_relocator::models::operation::{ActionKind, OperationAction, OperationRecordBuilder, OperationType};
use app_relocator::models::plan::{FileMoveOperation, MigrationPlan};
use app_relocator::models::registry::{RegistryReference, RegistryValueType};
use app_relocator::models::software::SoftwareEntry;
use app_relocator::services::registry::MemoryRegistry;
use app_relocator::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn sample_plan() -> MigrationPlan {
    let source = PathBuf::from("/apps/App");
    let target = PathBuf::from("/data/Software/App");
    MigrationPlan {
        id: "plan-1".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        software: SoftwareEntry::new("app", "App", &source).with_vendor("Contoso"),
        source_path: source.clone(),
        target_path: target.clone(),
        file_operations: vec![
            FileMoveOperation {
                source_path: source.join("bin/app.exe"),
                target_path: target.join("bin/app.exe"),
                size_bytes: 1000,
            },
            FileMoveOperation {
                source_path: source.join("data/config.ini"),
                target_path: target.join("data/config.ini"),
                size_bytes: 50,
            },
        ],
        directories: vec![target.join("bin"), target.join("data")],
        total_size_bytes: 1050,
        available_space_bytes: 1 << 30,
        recommended_link_type: LinkType::Junction,
    }
}

// ========== PLAN I/O TESTS ==========

#[test]
fn test_save_and_load_plan() {
    let plan = sample_plan();
    let temp_dir = TempDir::new().unwrap();
    let plan_path = temp_dir.path().join("nested").join("plan.json");

    save_plan(&plan, &plan_path).unwrap();
    assert!(plan_path.exists());

    let loaded = load_plan(&plan_path).unwrap();
    assert_eq!(loaded.id, plan.id);
    assert_eq!(loaded.source_path, plan.source_path);
    assert_eq!(loaded.target_path, plan.target_path);
    assert_eq!(loaded.file_operations, plan.file_operations);
    assert_eq!(loaded.total_size_bytes, 1050);
    assert_eq!(loaded.software.vendor.as_deref(), Some("Contoso"));
}

#[test]
fn test_tampered_plan_is_rejected() {
    let mut plan = sample_plan();
    plan.total_size_bytes = 10;
    let temp_dir = TempDir::new().unwrap();
    let plan_path = temp_dir.path().join("plan.json");
    save_plan(&plan, &plan_path).unwrap();

    let err = load_plan(&plan_path).unwrap_err();
    assert!(matches!(err, Error::Planning(_)));
}

#[test]
fn test_plan_with_escaping_target_is_rejected() {
    let mut plan = sample_plan();
    plan.file_operations[0].target_path = PathBuf::from("/elsewhere/app.exe");
    let temp_dir = TempDir::new().unwrap();
    let plan_path = temp_dir.path().join("plan.json");
    save_plan(&plan, &plan_path).unwrap();

    assert!(load_plan(&plan_path).is_err());
}

#[test]
fn test_load_missing_plan() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_plan(&temp_dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

// ========== CONFIG TESTS ==========

#[test]
fn test_load_full_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
default_target_path = "/data/Software"
preferred_link_type = "junction"
auto_update_registry = true
verify_integrity = false
naming_template = "{Vendor} - {Name}"
operations_dir = "/var/lib/relocator/ops"
registry_backup_dir = "/var/lib/relocator/reg"
registry_search_keys = ['HKLM\SOFTWARE\Vendor']
elevated = true
"#,
    )
    .unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.default_target_path, Some(PathBuf::from("/data/Software")));
    assert_eq!(config.preferred_link_type, Some(LinkType::Junction));
    assert!(!config.verify_integrity);
    assert_eq!(config.naming_template, "{Vendor} - {Name}");
    assert_eq!(config.operations_dir, PathBuf::from("/var/lib/relocator/ops"));
    assert_eq!(config.registry_search_keys, vec![r"HKLM\SOFTWARE\Vendor".to_string()]);
    assert_eq!(config.elevated, Some(true));
}

// ========== OPERATION LOG TESTS ==========

#[test]
fn test_operation_log_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("ops");

    let mut builder = OperationRecordBuilder::new(OperationType::Migration, "Migrate App");
    let id = builder.id().to_string();
    {
        let log = JsonOperationLog::new(&dir);
        log.append(builder.snapshot()).unwrap();
        builder.push(
            OperationAction::new(ActionKind::CopyFile, "Copied app.exe")
                .values("/apps/App/app.exe", "/data/App/app.exe")
                .reversible(),
        );
        log.update(builder.snapshot()).unwrap();
        log.update(&builder.finalize(true)).unwrap();
    }

    let reopened = JsonOperationLog::new(&dir);
    let record = reopened.get(&id).unwrap().unwrap();
    assert!(record.is_finalized());
    assert_eq!(record.actions.len(), 1);
    assert_eq!(record.actions[0].new_value.as_deref(), Some("/data/App/app.exe"));
    assert_eq!(reopened.list().unwrap().len(), 1);

    // Finalized records are closed for good.
    assert!(reopened.update(&record).is_err());
    // No temp files are left next to the records.
    let names: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec![format!("{}.json", id)]);
}

#[test]
fn test_operation_log_skips_corrupt_files() {
    let temp_dir = TempDir::new().unwrap();
    let log = JsonOperationLog::new(temp_dir.path());
    let builder = OperationRecordBuilder::new(OperationType::Migration, "Migrate App");
    log.append(builder.snapshot()).unwrap();
    fs::write(temp_dir.path().join("garbage.json"), "{not json").unwrap();

    assert_eq!(log.list().unwrap().len(), 1);
}

// ========== REGISTRY BACKUP TESTS ==========

#[test]
fn test_registry_backup_restores_values() {
    let temp_dir = TempDir::new().unwrap();
    let key = r"HKLM\SOFTWARE\Contoso\Editor";
    let store = Arc::new(MemoryRegistry::with_values([RegistryReference::new(
        key,
        "InstallDir",
        r"C:\Program Files\Editor",
        RegistryValueType::String,
    )]));
    let updater = RegistryUpdater::new(store.clone(), temp_dir.path().join("backups"));

    let old = Path::new(r"C:\Program Files\Editor");
    let new = Path::new(r"D:\Software\Editor");
    let references = updater.find_references(old).unwrap();
    let update = updater.update_references(old, new, &references);
    assert_eq!(update.updated_count, 1);
    assert_eq!(store.get(key, "InstallDir").unwrap().value_data, r"D:\Software\Editor");

    let restored = updater.restore_backup(update.backup_id.as_deref().unwrap()).unwrap();
    assert_eq!(restored.updated_count, 1);
    assert_eq!(store.get(key, "InstallDir").unwrap().value_data, r"C:\Program Files\Editor");
}
