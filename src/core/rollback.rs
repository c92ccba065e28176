//! Rollback execution module.
//!
//! Reverses a recorded migration, newest step first:
//! - Restore registry values to their recorded originals
//! - Remove the link and put the original directory back
//! - Delete copied files and created directories from the target
//!
//! Rollback is best effort. A failed step is reported and the rest still run,
//! but target copies are only deleted once everything else succeeded.

use crate::core::link::LinkManager;
use crate::core::operation_log::OperationLog;
use crate::core::registry::RegistryUpdater;
use crate::models::operation::{
    ActionKind, OperationAction, OperationRecord, OperationRecordBuilder, OperationType,
};
use crate::models::registry::RegistryReference;
use crate::models::result::RollbackResult;
use crate::utils::fs::is_dir_empty;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rollback coordinator.
#[derive(Clone)]
pub struct RollbackCoordinator {
    links: LinkManager,
    registry: Arc<RegistryUpdater>,
    log: Arc<dyn OperationLog>,
}

impl RollbackCoordinator {
    pub fn new(links: LinkManager, registry: Arc<RegistryUpdater>, log: Arc<dyn OperationLog>) -> Self {
        Self { links, registry, log }
    }

    /// Roll back a recorded operation.
    pub async fn rollback(&self, operation_id: &str, cancel: Option<CancellationToken>) -> RollbackResult {
        let this = self.clone();
        let id = operation_id.to_string();

        match tokio::task::spawn_blocking(move || this.run(&id, cancel)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Rollback task aborted: {}", e);
                RollbackResult::rejected(operation_id, &Error::other(format!("rollback task aborted: {}", e)))
            }
        }
    }

    fn run(&self, operation_id: &str, cancel: Option<CancellationToken>) -> RollbackResult {
        let target = match self.load_target(operation_id) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Rollback of {} rejected: {}", operation_id, e);
                return RollbackResult::rejected(operation_id, &e);
            }
        };
        if cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false) {
            return RollbackResult::rejected(operation_id, &Error::Cancelled);
        }

        let builder = OperationRecordBuilder::new(
            OperationType::Rollback,
            format!("Roll back {}", target.description),
        )
        .rollback_of(operation_id);
        if let Err(e) = self.log.append(builder.snapshot()) {
            tracing::error!("Cannot open rollback record: {}", e);
            return RollbackResult::rejected(operation_id, &e);
        }
        tracing::info!("Rolling back operation {} as {}", operation_id, builder.id());

        let mut pass = Pass {
            coordinator: self,
            target: &target,
            record: builder,
            result: RollbackResult {
                target_operation_id: operation_id.to_string(),
                ..Default::default()
            },
            deferred_files: Vec::new(),
            deferred_dirs: Vec::new(),
        };

        let outcome = pass.revert_actions(cancel.as_ref());
        pass.finish(outcome)
    }

    /// Fetch the record and check it can be rolled back.
    fn load_target(&self, operation_id: &str) -> Result<OperationRecord> {
        let record = self
            .log
            .get(operation_id)?
            .ok_or_else(|| Error::OperationNotFound(operation_id.to_string()))?;

        if record.op_type == OperationType::Rollback {
            return Err(Error::AlreadyRolledBack(format!(
                "{} is itself a rollback",
                operation_id
            )));
        }
        if !record.is_finalized() {
            return Err(Error::InvalidState(format!(
                "operation {} was never finalized",
                operation_id
            )));
        }

        let done = self
            .log
            .find_rollback_of(operation_id)?
            .into_iter()
            .any(|r| r.success == Some(true));
        if done {
            return Err(Error::AlreadyRolledBack(operation_id.to_string()));
        }

        Ok(record)
    }
}

/// State of one rollback.
struct Pass<'a> {
    coordinator: &'a RollbackCoordinator,
    target: &'a OperationRecord,
    record: OperationRecordBuilder,
    result: RollbackResult,
    deferred_files: Vec<PathBuf>,
    deferred_dirs: Vec<PathBuf>,
}

impl Pass<'_> {
    fn revert_actions(&mut self, cancel: Option<&CancellationToken>) -> Result<()> {
        let target = self.target;
        for action in target.actions.iter().rev().filter(|a| a.can_rollback) {
            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                return Err(Error::Cancelled);
            }

            match &action.kind {
                ActionKind::UpdateRegistryValue {
                    key_path,
                    value_name,
                    value_type,
                } => {
                    let original = RegistryReference::new(
                        key_path,
                        value_name,
                        action.original_value.clone().unwrap_or_default(),
                        *value_type,
                    );
                    match self.coordinator.registry.restore_value(&original) {
                        Ok(()) => self.reverted(format!("Restored {}", original.location())),
                        Err(e) => self.failed(original.location(), &e.to_string()),
                    }
                }
                ActionKind::CreateLink { .. } => {
                    let link = value_path(&action.original_value);
                    self.remove_link(&link);
                }
                ActionKind::StageSource => {
                    let source = value_path(&action.original_value);
                    let staging = value_path(&action.new_value);
                    self.restore_source(&source, &staging);
                }
                ActionKind::CopyFile => {
                    self.deferred_files.push(value_path(&action.new_value));
                }
                ActionKind::CreateDirectory => {
                    self.deferred_dirs.push(value_path(&action.new_value));
                }
                other => tracing::debug!("Nothing to revert for {:?}", other),
            }
        }

        if !self.result.failed_files.is_empty() {
            tracing::warn!(
                "Keeping target copies because {} steps failed",
                self.result.failed_files.len()
            );
            return Ok(());
        }

        self.remove_target_copies();
        Ok(())
    }

    fn remove_link(&mut self, link: &Path) {
        let coordinator = self.coordinator;
        let links = &coordinator.links;
        if links.get_link_info(link).is_some() {
            if links.remove_link(link) {
                self.reverted(format!("Removed link {}", link.display()));
            } else {
                self.failed(link.display().to_string(), "link could not be removed");
            }
        } else {
            tracing::debug!("{:?} is no longer a link", link);
            self.reverted(format!("Link {} already gone", link.display()));
        }
    }

    /// Put the original directory back from staging, then refill it from the
    /// target copies of every file that was released.
    fn restore_source(&mut self, source: &Path, staging: &Path) {
        if self.coordinator.links.get_link_info(source).is_some() {
            self.failed(source.display().to_string(), "link still occupies the source path");
            return;
        }

        let restored = if staging.exists() {
            if source.exists() {
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("both {} and {} exist", source.display(), staging.display()),
                ))
            } else {
                fs::rename(staging, source)
            }
        } else {
            fs::create_dir_all(source)
        };
        if let Err(e) = restored {
            self.failed(source.display().to_string(), &e.to_string());
            return;
        }

        let target = self.target;
        let link_target = target.actions.iter().find_map(|a| match a.kind {
            ActionKind::CreateLink { .. } => a.new_value.as_deref().map(PathBuf::from),
            _ => None,
        });

        if let Some(link_target) = &link_target {
            for action in target.actions.iter().filter(|a| a.kind == ActionKind::CreateDirectory) {
                let dir = value_path(&action.new_value);
                if let Ok(relative) = dir.strip_prefix(link_target) {
                    if let Err(e) = fs::create_dir_all(source.join(relative)) {
                        self.failed(source.join(relative).display().to_string(), &e.to_string());
                    }
                }
            }
        }

        let file_links: HashMap<PathBuf, PathBuf> = target
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::FileLink)
            .map(|a| (value_path(&a.original_value), value_path(&a.new_value)))
            .collect();

        for action in target.actions.iter().filter(|a| a.kind == ActionKind::CopyFile) {
            let original = value_path(&action.original_value);
            if fs::symlink_metadata(&original).is_ok() {
                continue;
            }
            let restored = match file_links.get(&original) {
                Some(link_target) => self.coordinator.links.create_file_link(&original, link_target),
                None => copy_back(&value_path(&action.new_value), &original),
            };
            if let Err(e) = restored {
                self.failed(original.display().to_string(), &e.to_string());
            }
        }

        self.reverted(format!("Restored {}", source.display()));
    }

    fn remove_target_copies(&mut self) {
        for file in std::mem::take(&mut self.deferred_files) {
            match fs::remove_file(&file) {
                Ok(()) => self.reverted(format!("Deleted {}", file.display())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("Copy already gone: {:?}", file);
                }
                Err(e) => self.failed(file.display().to_string(), &e.to_string()),
            }
        }

        for dir in std::mem::take(&mut self.deferred_dirs) {
            if !dir.exists() {
                continue;
            }
            if !is_dir_empty(&dir) {
                tracing::warn!("Leaving non-empty directory {:?}", dir);
                continue;
            }
            match fs::remove_dir(&dir) {
                Ok(()) => self.reverted(format!("Removed directory {}", dir.display())),
                Err(e) => self.failed(dir.display().to_string(), &e.to_string()),
            }
        }
    }

    fn reverted(&mut self, description: String) {
        tracing::debug!("{}", description);
        self.result.reverted_actions += 1;
        self.record.push(OperationAction::new(ActionKind::Revert, description));
    }

    fn failed(&mut self, what: String, reason: &str) {
        tracing::warn!("Rollback step failed for {}: {}", what, reason);
        self.record.push(OperationAction::new(
            ActionKind::Revert,
            format!("Failed to restore {}: {}", what, reason),
        ));
        self.result.failed_files.push(what);
    }

    fn finish(self, outcome: Result<()>) -> RollbackResult {
        let mut result = self.result;
        let success = outcome.is_ok() && result.failed_files.is_empty();
        let record = self.record.finalize(success);

        result.success = success;
        result.operation_id = Some(record.id.clone());
        match &outcome {
            Err(e) => {
                result.error_kind = Some(e.kind());
                result.error_message = Some(e.to_string());
            }
            Ok(()) if !success => {
                result.error_message = Some(format!(
                    "{} items could not be restored",
                    result.failed_files.len()
                ));
            }
            Ok(()) => {}
        }

        if let Err(e) = self.coordinator.log.update(&record) {
            tracing::error!("Failed to persist rollback {}: {}", record.id, e);
            result.success = false;
            result.error_kind = Some(e.kind());
            result.error_message = Some(format!("rollback record could not be saved: {}", e));
        }

        tracing::info!(
            "Rollback {} of {} finished: success={}, {} reverted, {} failed",
            record.id,
            result.target_operation_id,
            result.success,
            result.reverted_actions,
            result.failed_files.len()
        );
        result
    }
}

fn value_path(value: &Option<String>) -> PathBuf {
    PathBuf::from(value.as_deref().unwrap_or_default())
}

fn copy_back(copy: &Path, original: &Path) -> io::Result<()> {
    if let Some(parent) = original.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(copy, original)?;
    Ok(())
}
