//! Plan executor module.
//!
//! Drives one migration through its stages:
//! - copying files into the target tree
//! - verifying the copies
//! - replacing the source directory with a link
//! - rewriting registry references
//!
//! Every reversible step is appended to an operation record that is persisted
//! when the run starts, checkpointed after each stage and finalized exactly
//! once, so a failed or cancelled run can be rolled back later.

use crate::core::link::LinkManager;
use crate::core::operation_log::OperationLog;
use crate::core::registry::RegistryUpdater;
use crate::models::operation::{ActionKind, OperationAction, OperationRecordBuilder, OperationType};
use crate::models::options::{ConflictPolicy, LockedFilePolicy, MigrationOptions};
use crate::models::plan::{FileMoveOperation, MigrationPlan};
use crate::models::progress::{MigrationProgress, MigrationState, ProgressSink};
use crate::models::result::MigrationResult;
use crate::utils::fs::{copy_file_hashed, is_lock_error, prune_empty_dirs, unique_path, CopyOutcome};
use crate::utils::hash;
use crate::{Error, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Migration executor.
///
/// Runs one migration at a time; callers must not point two executors at
/// overlapping source or target paths.
#[derive(Clone)]
pub struct Executor {
    links: LinkManager,
    registry: Arc<RegistryUpdater>,
    log: Arc<dyn OperationLog>,
}

impl Executor {
    pub fn new(links: LinkManager, registry: Arc<RegistryUpdater>, log: Arc<dyn OperationLog>) -> Self {
        Self { links, registry, log }
    }

    /// Execute a plan.
    ///
    /// Expected failures come back as a failed `MigrationResult`; this never
    /// returns an error.
    pub async fn execute(
        &self,
        plan: &MigrationPlan,
        options: &MigrationOptions,
        progress: Option<ProgressSink>,
        cancel: Option<CancellationToken>,
    ) -> MigrationResult {
        let this = self.clone();
        let plan = plan.clone();
        let options = options.clone();

        match tokio::task::spawn_blocking(move || this.run(&plan, &options, progress, cancel)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Migration task aborted: {}", e);
                MigrationResult::rejected(&Error::other(format!("migration task aborted: {}", e)))
            }
        }
    }

    fn run(
        &self,
        plan: &MigrationPlan,
        options: &MigrationOptions,
        progress: Option<ProgressSink>,
        cancel: Option<CancellationToken>,
    ) -> MigrationResult {
        if let Err(e) = precheck(&self.links, plan, options) {
            tracing::error!("Migration rejected: {}", e);
            return MigrationResult::rejected(&e);
        }

        let record = OperationRecordBuilder::new(
            OperationType::Migration,
            format!(
                "Migrate {} from {} to {}",
                plan.software.name,
                plan.source_path.display(),
                plan.target_path.display()
            ),
        );
        if let Err(e) = self.log.append(record.snapshot()) {
            tracing::error!("Cannot open operation record: {}", e);
            return MigrationResult::rejected(&e);
        }
        tracing::info!("Operation {} started for plan {}", record.id(), plan.id);

        let mut result = MigrationResult::new();
        result.operation_id = Some(record.id().to_string());

        let mut run = Run {
            exec: self,
            plan,
            options,
            progress,
            cancel,
            state: MigrationState::NotStarted,
            record,
            result,
            transferred: 0,
        };
        let outcome = run.stages();
        run.finish(outcome)
    }
}

/// Checks that must pass before anything is written.
fn precheck(links: &LinkManager, plan: &MigrationPlan, options: &MigrationOptions) -> Result<()> {
    options.validate()?;
    plan.validate()?;
    if !plan.fits() {
        return Err(Error::InsufficientSpace {
            required: plan.total_size_bytes,
            available: plan.available_space_bytes,
        });
    }
    // A source already replaced by a link means this plan has run before.
    if links.get_link_info(&plan.source_path).is_some() {
        return Err(Error::Planning(format!(
            "source is already a link: {}",
            plan.source_path.display()
        )));
    }
    if !plan.source_path.is_dir() {
        return Err(Error::Planning(format!(
            "source directory is missing: {}",
            plan.source_path.display()
        )));
    }
    Ok(())
}

struct CopiedFile {
    source: PathBuf,
    dest: PathBuf,
    sha256: String,
}

/// State of one execution.
struct Run<'a> {
    exec: &'a Executor,
    plan: &'a MigrationPlan,
    options: &'a MigrationOptions,
    progress: Option<ProgressSink>,
    cancel: Option<CancellationToken>,
    state: MigrationState,
    record: OperationRecordBuilder,
    result: MigrationResult,
    transferred: u64,
}

impl Run<'_> {
    fn stages(&mut self) -> Result<()> {
        self.transition(MigrationState::CopyingFiles, "Copying files");
        let copied = self.copy_files()?;
        self.checkpoint();

        let migrated = if self.options.verify_integrity {
            self.check_cancelled()?;
            self.transition(MigrationState::VerifyingIntegrity, "Verifying copies");
            self.verify(copied)?
        } else {
            copied.into_iter().map(|c| c.source).collect()
        };
        self.result.migrated_files = migrated;

        if self.result.migrated_files.is_empty() && !self.plan.file_operations.is_empty() {
            return Err(Error::other(format!(
                "no files were migrated ({} skipped, {} failed)",
                self.result.skipped_files.len(),
                self.result.failed_files.len()
            )));
        }

        self.check_cancelled()?;
        self.transition(MigrationState::CreatingLink, "Creating link");
        self.create_link()?;
        self.checkpoint();

        if self.options.update_registry {
            self.transition(MigrationState::UpdatingRegistry, "Updating registry references");
            self.update_registry()?;
        }

        self.transferred = self.plan.total_size_bytes;
        self.transition(MigrationState::Completed, "Migration completed");
        Ok(())
    }

    fn copy_files(&mut self) -> Result<Vec<CopiedFile>> {
        let plan = self.plan;
        self.check_cancelled()?;
        self.create_dirs(&plan.target_path)?;
        for dir in &plan.directories {
            self.check_cancelled()?;
            self.create_dirs(dir)?;
        }

        let mut copied = Vec::with_capacity(plan.file_operations.len());
        for op in &plan.file_operations {
            self.check_cancelled()?;
            if let Some(file) = self.copy_one(op)? {
                copied.push(file);
            }
        }

        tracing::info!(
            "Copied {} of {} files ({} skipped, {} failed)",
            copied.len(),
            plan.file_operations.len(),
            self.result.skipped_files.len(),
            self.result.failed_files.len()
        );
        Ok(copied)
    }

    /// Copy a single file. `None` when the file was skipped or failed.
    fn copy_one(&mut self, op: &FileMoveOperation) -> Result<Option<CopiedFile>> {
        let mut dest = op.target_path.clone();
        if dest.exists() {
            match self.options.on_file_conflict {
                ConflictPolicy::Skip => {
                    tracing::warn!("Destination exists, skipping {:?}", dest);
                    self.result.skipped_files.push(op.source_path.clone());
                    return Ok(None);
                }
                ConflictPolicy::Overwrite => {
                    tracing::debug!("Overwriting {:?}", dest);
                }
                ConflictPolicy::Rename => {
                    dest = unique_path(&dest);
                    tracing::debug!("Destination exists, copying to {:?}", dest);
                }
                ConflictPolicy::Ask => {
                    return Err(Error::FileConflict(dest.display().to_string()));
                }
            }
        }

        let file = match File::open(&op.source_path) {
            Ok(file) => file,
            Err(e) if is_lock_error(&e) => match self.options.on_locked_file {
                LockedFilePolicy::Skip => {
                    tracing::warn!("Skipping locked file {:?}: {}", op.source_path, e);
                    self.result.skipped_files.push(op.source_path.clone());
                    return Ok(None);
                }
                LockedFilePolicy::Abort | LockedFilePolicy::Ask => {
                    return Err(Error::LockedFileAbort(op.source_path.clone()));
                }
            },
            Err(e) => {
                tracing::warn!("Cannot read {:?}: {}", op.source_path, e);
                self.result.failed_files.push(op.source_path.clone());
                return Ok(None);
            }
        };

        if let Some(parent) = dest.parent() {
            self.create_dirs(parent)?;
        }

        let state = self.state;
        let total = self.plan.total_size_bytes;
        let sink = self.progress.clone();
        let mut transferred = self.transferred;
        let outcome = copy_file_hashed(file, &dest, self.cancel.as_ref(), |n| {
            transferred += n;
            if let Some(sink) = &sink {
                let _ = sink.send(
                    MigrationProgress::new(state, "Copying files", transferred, total).with_file(dest.clone()),
                );
            }
        });
        self.transferred = transferred;

        match outcome {
            Ok(CopyOutcome::Complete { bytes, sha256 }) => {
                tracing::debug!("Copied {:?} -> {:?} ({} bytes)", op.source_path, dest, bytes);
                self.record.push(
                    OperationAction::new(ActionKind::CopyFile, format!("Copied {}", op.source_path.display()))
                        .values(op.source_path.display().to_string(), dest.display().to_string())
                        .reversible(),
                );
                Ok(Some(CopiedFile {
                    source: op.source_path.clone(),
                    dest,
                    sha256,
                }))
            }
            Ok(CopyOutcome::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!("Failed to copy {:?}: {}", op.source_path, e);
                self.result.failed_files.push(op.source_path.clone());
                Ok(None)
            }
        }
    }

    /// Re-read every copy and compare it with the hash taken while copying.
    fn verify(&mut self, copied: Vec<CopiedFile>) -> Result<Vec<PathBuf>> {
        let mut verified = Vec::with_capacity(copied.len());
        for file in copied {
            self.check_cancelled()?;
            match hash::sha256_file(&file.dest) {
                Ok(actual) if actual == file.sha256 => verified.push(file.source),
                Ok(_) => {
                    tracing::warn!("Checksum mismatch for {:?}", file.dest);
                    self.discard_copy(file);
                }
                Err(e) => {
                    tracing::warn!("Cannot verify {:?}: {}", file.dest, e);
                    self.discard_copy(file);
                }
            }
        }
        tracing::info!("Verified {} files", verified.len());
        Ok(verified)
    }

    fn discard_copy(&mut self, file: CopiedFile) {
        if let Err(e) = fs::remove_file(&file.dest) {
            tracing::warn!("Failed to remove bad copy {:?}: {}", file.dest, e);
        }
        self.result.failed_files.push(file.source);
    }

    /// Move the source aside, link it to the target and release staged copies.
    fn create_link(&mut self) -> Result<()> {
        let plan = self.plan;
        let source = &plan.source_path;
        let target = &plan.target_path;
        let staging = staging_path(source, self.record.id())?;

        fs::rename(source, &staging).map_err(|e| {
            Error::LinkCreation(format!("cannot release {}: {}", source.display(), e))
        })?;
        self.record.push(
            OperationAction::new(ActionKind::StageSource, format!("Staged {}", source.display()))
                .values(source.display().to_string(), staging.display().to_string())
                .reversible(),
        );
        self.checkpoint();
        tracing::debug!("Staged {:?} at {:?}", source, staging);

        let link = self.exec.links.create_link(source, target, self.options.link_type);
        if !link.success {
            let message = link.error_message.unwrap_or_else(|| "unknown error".to_string());
            match fs::rename(&staging, source) {
                Ok(()) => self.record.push(
                    OperationAction::new(ActionKind::Revert, format!("Restored {}", source.display()))
                        .values(staging.display().to_string(), source.display().to_string()),
                ),
                Err(e) => tracing::error!("Cannot restore {:?} from {:?}: {}", source, staging, e),
            }
            return Err(Error::LinkCreation(message));
        }

        self.record.push(
            OperationAction::new(
                ActionKind::CreateLink {
                    link_type: self.options.link_type,
                },
                format!("Linked {} to {}", source.display(), target.display()),
            )
            .values(source.display().to_string(), target.display().to_string())
            .reversible(),
        );
        tracing::info!("Created {} {:?} -> {:?}", self.options.link_type, source, target);

        self.release_staging(&staging);
        Ok(())
    }

    /// Drop migrated files from staging; keep whatever was not migrated.
    fn release_staging(&mut self, staging: &Path) {
        let plan = self.plan;
        for migrated in &self.result.migrated_files {
            let Ok(relative) = migrated.strip_prefix(&plan.source_path) else {
                continue;
            };
            if crosses_link(staging, relative) {
                continue;
            }
            let staged = staging.join(relative);
            // Rollback rebuilds file links from this entry rather than copying
            // the followed content back.
            if let Ok(link_target) = fs::read_link(&staged) {
                self.record.push(
                    OperationAction::new(ActionKind::FileLink, format!("Released link {}", migrated.display()))
                        .values(migrated.display().to_string(), link_target.display().to_string()),
                );
            }
            if let Err(e) = fs::remove_file(&staged) {
                tracing::warn!("Failed to release staged file {:?}: {}", staged, e);
            }
        }
        if let Err(e) = prune_empty_dirs(staging) {
            tracing::warn!("Failed to prune staging {:?}: {}", staging, e);
        }

        let source = plan.source_path.display().to_string();
        if staging.exists() {
            tracing::warn!("Files that were not migrated are kept in {:?}", staging);
            self.result.leftover_path = Some(staging.to_path_buf());
            self.record.push(
                OperationAction::new(ActionKind::KeepLeftovers, "Kept unmigrated files")
                    .values(source, staging.display().to_string()),
            );
        } else {
            self.record.push(
                OperationAction::new(ActionKind::DiscardStaging, "Released staged source")
                    .values(source, staging.display().to_string()),
            );
        }
    }

    fn update_registry(&mut self) -> Result<()> {
        let (exec, plan) = (self.exec, self.plan);
        let registry = &exec.registry;
        let references = registry.find_references(&plan.source_path)?;
        tracing::info!(
            "Found {} registry references to {:?} ({})",
            references.len(),
            plan.source_path,
            registry.backend_name()
        );

        let update = registry.update_references(&plan.source_path, &plan.target_path, &references);
        for entry in update.report.entries.iter().filter(|e| e.success) {
            self.record.push(
                OperationAction::new(
                    ActionKind::UpdateRegistryValue {
                        key_path: entry.key_path.clone(),
                        value_name: entry.value_name.clone(),
                        value_type: entry.value_type,
                    },
                    format!("Updated {}\\{}", entry.key_path, entry.value_name),
                )
                .values(entry.old_value.clone(), entry.new_value.clone())
                .reversible(),
            );
        }
        self.result.registry_updated = update.updated_count;
        self.result.registry_failed = update.failed_count;
        self.checkpoint();

        if update.updated_count == 0 && update.failed_count > 0 {
            return Err(Error::RegistryUpdate(
                update
                    .error_message
                    .unwrap_or_else(|| "no registry value could be written".to_string()),
            ));
        }
        if update.failed_count > 0 {
            tracing::warn!(
                "{} registry values could not be updated",
                update.failed_count
            );
        }
        Ok(())
    }

    /// Create `dir` and any missing ancestors, recording each one.
    fn create_dirs(&mut self, dir: &Path) -> Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .take_while(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect();

        for path in missing.into_iter().rev() {
            match fs::create_dir(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
            tracing::debug!("Created directory {:?}", path);
            self.record.push(
                OperationAction::new(ActionKind::CreateDirectory, format!("Created {}", path.display()))
                    .new_value(path.display().to_string())
                    .reversible(),
            );
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, next: MigrationState, message: &str) {
        if !self.state.can_transition_to(next) {
            tracing::warn!("Unexpected state change {} -> {}", self.state, next);
        }
        tracing::debug!("State {} -> {}", self.state, next);
        self.state = next;
        self.emit(message);
    }

    fn emit(&self, message: &str) {
        if let Some(sink) = &self.progress {
            let _ = sink.send(MigrationProgress::new(
                self.state,
                message,
                self.transferred,
                self.plan.total_size_bytes,
            ));
        }
    }

    fn checkpoint(&self) {
        if let Err(e) = self.exec.log.update(self.record.snapshot()) {
            tracing::warn!("Failed to checkpoint operation {}: {}", self.record.id(), e);
        }
    }

    /// Close the record and build the terminal result.
    fn finish(mut self, outcome: Result<()>) -> MigrationResult {
        match &outcome {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                tracing::warn!("Migration cancelled in state {}", self.state);
                self.transition(MigrationState::Cancelled, "Migration cancelled");
            }
            Err(e) => {
                tracing::error!("Migration failed in state {}: {}", self.state, e);
                self.transition(MigrationState::Failed, "Migration failed");
            }
        }

        let success = outcome.is_ok();
        let record = self.record.finalize(success);
        let mut result = self.result;
        result.state = self.state;
        result.success = success;
        if let Err(e) = &outcome {
            result.error_kind = Some(e.kind());
            result.error_message = Some(e.to_string());
        }

        if let Err(e) = self.exec.log.update(&record) {
            tracing::error!("Failed to persist operation {}: {}", record.id, e);
            result.success = false;
            result.state = MigrationState::Failed;
            result.error_kind = Some(e.kind());
            result.error_message = Some(format!("operation record could not be saved: {}", e));
        }

        tracing::info!(
            "Operation {} finished: {} ({} migrated, {} skipped, {} failed)",
            record.id,
            result.state,
            result.migrated_files.len(),
            result.skipped_files.len(),
            result.failed_files.len()
        );
        result
    }
}

/// Sibling directory the source is renamed to while the link takes its place.
fn staging_path(source: &Path, operation_id: &str) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::LinkCreation(format!("cannot stage {}", source.display())))?;
    let short: String = operation_id.chars().take(8).collect();
    Ok(unique_path(&source.with_file_name(format!(
        "{}.relocating-{}",
        name.to_string_lossy(),
        short
    ))))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Whether `root` or any directory between it and `root/relative` is a link.
fn crosses_link(root: &Path, relative: &Path) -> bool {
    if is_symlink(root) {
        return true;
    }
    let mut current = root.to_path_buf();
    let parent_components = relative.parent().map(|p| p.components().count()).unwrap_or(0);
    for component in relative.components().take(parent_components) {
        current.push(component);
        if is_symlink(&current) {
            return true;
        }
    }
    false
}
