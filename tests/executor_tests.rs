//! Integration tests for migration execution.
//!
//! Tests cover:
//! - Space guard and option validation
//! - The full copy, link and registry pipeline
//! - Conflict and locked-file policies
//! - Cancellation
//! - Progress reporting and operation records

use app_relocator::core::engine::{EngineParts, MigrationEngine};
use app_relocator::core::operation_log::{JsonOperationLog, OperationLog};
use app_relocator::error::ErrorKind;
use app_relocator::generators::naming::TemplateNamingEngine;
use app_relocator::models::options::{ConflictPolicy, LockedFilePolicy, MigrationOptions};
use app_relocator::models::plan::MigrationPlan;
use app_relocator::models::progress::MigrationState;
use app_relocator::models::registry::{RegistryReference, RegistryValueType};
use app_relocator::models::software::SoftwareEntry;
use app_relocator::services::disk::FixedSpaceProbe;
use app_relocator::services::registry::MemoryRegistry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const UNINSTALL_KEY: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\App";

struct Fixture {
    temp_dir: TempDir,
    engine: MigrationEngine,
    registry: Arc<MemoryRegistry>,
}

impl Fixture {
    fn new(available: u64) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let engine = MigrationEngine::new(EngineParts {
            naming: Arc::new(TemplateNamingEngine),
            space: Arc::new(FixedSpaceProbe(available)),
            registry: registry.clone(),
            log: Arc::new(JsonOperationLog::new(temp_dir.path().join("ops"))),
            registry_backup_dir: temp_dir.path().join("backups"),
            elevated: Some(false),
        });
        Self {
            temp_dir,
            engine,
            registry,
        }
    }

    fn source(&self) -> PathBuf {
        self.temp_dir.path().join("App")
    }

    fn base(&self) -> PathBuf {
        self.temp_dir.path().join("Software")
    }

    fn target(&self) -> PathBuf {
        self.base().join("App")
    }

    /// App/bin/app.exe (1000 bytes) and App/data/config.ini (50 bytes).
    fn write_app(&self) {
        let source = self.source();
        fs::create_dir_all(source.join("bin")).unwrap();
        fs::create_dir_all(source.join("data")).unwrap();
        fs::write(source.join("bin").join("app.exe"), vec![0xAB; 1000]).unwrap();
        fs::write(source.join("data").join("config.ini"), vec![b'c'; 50]).unwrap();
    }

    async fn plan(&self) -> MigrationPlan {
        let entry = SoftwareEntry::new("app", "App", self.source());
        self.engine.create_plan(&entry, &self.base(), "{Name}").await.unwrap()
    }

    fn log(&self) -> JsonOperationLog {
        JsonOperationLog::new(self.temp_dir.path().join("ops"))
    }
}

fn options() -> MigrationOptions {
    MigrationOptions {
        update_registry: false,
        ..Default::default()
    }
}

fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

// ========== GUARD TESTS ==========

#[tokio::test]
async fn test_insufficient_space_writes_nothing() {
    let fx = Fixture::new(100);
    fx.write_app();
    let plan = fx.plan().await;
    assert!(!plan.fits());

    let result = fx.engine.execute(&plan, &options(), None, None).await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::InsufficientSpace));
    assert!(result.operation_id.is_none());
    assert!(!fx.base().exists());
    assert!(!fx.temp_dir.path().join("ops").exists());
    assert!(!is_link(&fx.source()));
}

#[tokio::test]
async fn test_ask_policy_is_rejected() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;

    let opts = MigrationOptions {
        on_file_conflict: ConflictPolicy::Ask,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidOptions));
    assert!(result.operation_id.is_none());
    assert!(!fx.base().exists());
}

#[tokio::test]
async fn test_rerunning_executed_plan_is_rejected() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;
    let first = fx.engine.execute(&plan, &options(), None, None).await;
    assert!(first.success, "{:?}", first.error_message);

    for policy in [ConflictPolicy::Overwrite, ConflictPolicy::Rename, ConflictPolicy::Skip] {
        let opts = MigrationOptions {
            on_file_conflict: policy,
            ..options()
        };
        let again = fx.engine.execute(&plan, &opts, None, None).await;

        assert!(!again.success, "{:?} accepted a linked source", policy);
        assert_eq!(again.error_kind, Some(ErrorKind::PlanningError));
        assert!(again.operation_id.is_none());
    }

    assert!(is_link(&fx.source()));
    assert_eq!(fs::read_link(fx.source()).unwrap(), fx.target());
    assert_eq!(
        fs::read(fx.target().join("bin").join("app.exe")).unwrap(),
        vec![0xAB; 1000]
    );
    assert_eq!(fs::read(fx.target().join("data").join("config.ini")).unwrap().len(), 50);
    assert_eq!(fs::read_dir(fx.target().join("bin")).unwrap().count(), 1);
    assert_eq!(fx.log().list().unwrap().len(), 1);
}

// ========== PIPELINE TESTS ==========

#[tokio::test]
async fn test_concrete_scenario_creates_link() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;

    let result = fx.engine.execute(&plan, &options(), None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.state, MigrationState::Completed);
    assert_eq!(result.migrated_files.len(), 2);
    assert!(result.skipped_files.is_empty());
    assert!(result.failed_files.is_empty());
    assert!(result.leftover_path.is_none());

    assert!(is_link(&fx.source()));
    assert_eq!(fs::read_link(fx.source()).unwrap(), fx.target());
    assert_eq!(
        fs::read(fx.target().join("bin").join("app.exe")).unwrap(),
        vec![0xAB; 1000]
    );
    assert_eq!(fs::read(fx.target().join("data").join("config.ini")).unwrap().len(), 50);
    // Reads through the link land on the new copy.
    assert_eq!(fs::read(fx.source().join("data").join("config.ini")).unwrap().len(), 50);

    let siblings: Vec<_> = fs::read_dir(fx.temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.contains("relocating"))
        .collect();
    assert!(siblings.is_empty(), "staging left behind: {:?}", siblings);

    let record = fx.log().get(result.operation_id.as_deref().unwrap()).unwrap().unwrap();
    assert!(record.is_finalized());
    assert_eq!(record.success, Some(true));
}

#[tokio::test]
async fn test_empty_plan_still_links() {
    let fx = Fixture::new(u64::MAX);
    fs::create_dir_all(fx.source()).unwrap();
    let plan = fx.plan().await;
    assert!(plan.file_operations.is_empty());

    let result = fx.engine.execute(&plan, &options(), None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert!(is_link(&fx.source()));
    assert!(fx.target().is_dir());
}

#[tokio::test]
async fn test_empty_directories_are_mirrored() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    fs::create_dir_all(fx.source().join("logs").join("old")).unwrap();
    let plan = fx.plan().await;

    let result = fx.engine.execute(&plan, &options(), None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert!(fx.target().join("logs").join("old").is_dir());
}

#[tokio::test]
async fn test_registry_references_are_rewritten() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let source = fx.source().display().to_string();
    let target = fx.target().display().to_string();
    fx.registry.insert(RegistryReference::new(
        UNINSTALL_KEY,
        "InstallLocation",
        source.clone(),
        RegistryValueType::String,
    ));
    fx.registry.insert(RegistryReference::new(
        UNINSTALL_KEY,
        "DisplayIcon",
        format!("{}/bin/app.exe,0", source),
        RegistryValueType::String,
    ));
    let plan = fx.plan().await;

    let opts = MigrationOptions {
        update_registry: true,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.registry_updated, 2);
    assert_eq!(result.registry_failed, 0);
    assert_eq!(
        fx.registry.get(UNINSTALL_KEY, "InstallLocation").unwrap().value_data,
        target
    );
    assert_eq!(
        fx.registry.get(UNINSTALL_KEY, "DisplayIcon").unwrap().value_data,
        format!("{}/bin/app.exe,0", target)
    );
}

#[tokio::test]
async fn test_registry_total_failure_fails_execution() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    fx.registry.insert(RegistryReference::new(
        UNINSTALL_KEY,
        "InstallLocation",
        fx.source().display().to_string(),
        RegistryValueType::String,
    ));
    fx.registry.deny_writes(UNINSTALL_KEY, "InstallLocation");
    let plan = fx.plan().await;

    let opts = MigrationOptions {
        update_registry: true,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(!result.success);
    assert_eq!(result.state, MigrationState::Failed);
    assert_eq!(result.error_kind, Some(ErrorKind::RegistryUpdateError));
    assert_eq!(result.registry_failed, 1);
    assert!(result.operation_id.is_some());

    let record = fx.log().get(result.operation_id.as_deref().unwrap()).unwrap().unwrap();
    assert_eq!(record.success, Some(false));
    assert!(record.is_finalized());
}

// ========== POLICY TESTS ==========

#[tokio::test]
async fn test_rename_conflict_keeps_existing_file() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;

    let existing = fx.target().join("bin").join("app.exe");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, "already here").unwrap();

    let opts = MigrationOptions {
        on_file_conflict: ConflictPolicy::Rename,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.migrated_files.len(), 2);
    assert_eq!(fs::read_to_string(&existing).unwrap(), "already here");

    let renamed = fx.target().join("bin").join("app (1).exe");
    assert_eq!(fs::read(&renamed).unwrap(), vec![0xAB; 1000]);
    let names: Vec<_> = fs::read_dir(fx.target().join("bin"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn test_skip_conflict_keeps_leftovers() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;

    let existing = fx.target().join("data").join("config.ini");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, "mine").unwrap();

    let opts = MigrationOptions {
        on_file_conflict: ConflictPolicy::Skip,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.skipped_files, vec![fx.source().join("data").join("config.ini")]);
    assert_eq!(fs::read_to_string(&existing).unwrap(), "mine");

    let leftover = result.leftover_path.expect("leftovers kept");
    assert_eq!(
        fs::read(leftover.join("data").join("config.ini")).unwrap(),
        vec![b'c'; 50]
    );
    assert!(!leftover.join("bin").exists());
}

/// Make a file unreadable. Returns false when the process can read it anyway.
#[cfg(unix)]
fn lock_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    fs::File::open(path).is_err()
}

#[cfg(unix)]
#[tokio::test]
async fn test_locked_file_skip() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let locked = fx.source().join("data").join("config.ini");
    if !lock_file(&locked) {
        return;
    }
    let plan = fx.plan().await;

    let opts = MigrationOptions {
        on_locked_file: LockedFilePolicy::Skip,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.state, MigrationState::Completed);
    assert_eq!(result.skipped_files, vec![locked]);
    assert_eq!(result.migrated_files.len(), 1);
    assert!(result.leftover_path.is_some());
    assert!(is_link(&fx.source()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_locked_file_abort_leaves_copies() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let locked = fx.source().join("data").join("config.ini");
    if !lock_file(&locked) {
        return;
    }
    let plan = fx.plan().await;

    let opts = MigrationOptions {
        on_locked_file: LockedFilePolicy::Abort,
        ..options()
    };
    let result = fx.engine.execute(&plan, &opts, None, None).await;

    assert!(!result.success);
    assert_eq!(result.state, MigrationState::Failed);
    assert_eq!(result.error_kind, Some(ErrorKind::LockedFileAbort));
    assert!(result.operation_id.is_some());
    assert!(!is_link(&fx.source()));
    assert!(fx.source().join("bin").join("app.exe").exists());
    assert!(fx.target().join("bin").join("app.exe").exists());
}

// ========== CANCELLATION AND PROGRESS TESTS ==========

#[tokio::test]
async fn test_cancelled_before_copy_leaves_source_intact() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;

    let token = CancellationToken::new();
    token.cancel();
    let result = fx.engine.execute(&plan, &options(), None, Some(token)).await;

    assert!(!result.success);
    assert_eq!(result.state, MigrationState::Cancelled);
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert!(result.migrated_files.is_empty());
    assert!(!is_link(&fx.source()));
    assert_eq!(fs::read(fx.source().join("bin").join("app.exe")).unwrap().len(), 1000);
    assert!(!fx.target().join("bin").join("app.exe").exists());

    let record = fx.log().get(result.operation_id.as_deref().unwrap()).unwrap().unwrap();
    assert!(record.is_finalized());
    assert_eq!(record.success, Some(false));
}

#[tokio::test]
async fn test_progress_is_reported_in_order() {
    let fx = Fixture::new(u64::MAX);
    fx.write_app();
    let plan = fx.plan().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let result = fx.engine.execute(&plan, &options(), Some(tx), None).await;
    assert!(result.success, "{:?}", result.error_message);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(!events.is_empty());
    let last = events.last().unwrap();
    assert_eq!(last.state, MigrationState::Completed);
    assert_eq!(last.percent, 100);
    assert!(events.iter().any(|e| e.state == MigrationState::VerifyingIntegrity));
    assert!(events.iter().any(|e| e.current_file.is_some()));

    let mut previous = MigrationState::NotStarted;
    for event in &events {
        assert!(
            event.state == previous || previous.can_transition_to(event.state),
            "{} -> {}",
            previous,
            event.state
        );
        previous = event.state;
    }
}

#[tokio::test]
async fn test_cancel_during_copy_leaves_no_partial_file() {
    let fx = Fixture::new(u64::MAX);
    let big = fx.source().join("data").join("assets.pak");
    fs::create_dir_all(big.parent().unwrap()).unwrap();
    fs::write(&big, vec![0x5A; 64 * 1024 * 1024]).unwrap();
    let plan = fx.plan().await;

    let token = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<app_relocator::models::progress::MigrationProgress>();
    let trigger = token.clone();
    let watcher = async move {
        while let Some(event) = rx.recv().await {
            if event.current_file.is_some() {
                trigger.cancel();
            }
        }
    };
    let opts = options();
    let (result, ()) = tokio::join!(
        fx.engine.execute(&plan, &opts, Some(tx), Some(token)),
        watcher
    );

    assert!(!result.success);
    assert_eq!(result.state, MigrationState::Cancelled);
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert!(result.migrated_files.is_empty());

    // Neither the destination nor its temp copy survives.
    let leftovers: Vec<_> = fs::read_dir(fx.target().join("data"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);
    assert!(!is_link(&fx.source()));
    assert_eq!(fs::metadata(&big).unwrap().len(), 64 * 1024 * 1024);
}
