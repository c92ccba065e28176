//! Migration engine facade.
//!
//! Wires the planner, executor and rollback coordinator to one operation log
//! and one registry store and exposes the three host operations.

use crate::core::executor::Executor;
use crate::core::link::{can_create_symlinks, LinkManager};
use crate::core::operation_log::{JsonOperationLog, OperationLog};
use crate::core::planner::Planner;
use crate::core::registry::RegistryUpdater;
use crate::core::rollback::RollbackCoordinator;
use crate::generators::naming::{NamingEngine, TemplateNamingEngine};
use crate::models::config::Config;
use crate::models::options::MigrationOptions;
use crate::models::plan::MigrationPlan;
use crate::models::progress::ProgressSink;
use crate::models::result::{MigrationResult, RollbackResult};
use crate::models::software::SoftwareEntry;
use crate::services::disk::{DiskSpaceProbe, SpaceProbe};
use crate::services::registry::RegistryStore;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Collaborators the engine is built from.
pub struct EngineParts {
    pub naming: Arc<dyn NamingEngine>,
    pub space: Arc<dyn SpaceProbe>,
    pub registry: Arc<dyn RegistryStore>,
    pub log: Arc<dyn OperationLog>,
    pub registry_backup_dir: PathBuf,
    /// Whether symbolic links can be created. Unknown means no.
    pub elevated: Option<bool>,
}

/// Planner, executor and rollback coordinator sharing one log.
pub struct MigrationEngine {
    planner: Planner,
    executor: Executor,
    rollback: RollbackCoordinator,
    naming: Arc<dyn NamingEngine>,
    log: Arc<dyn OperationLog>,
}

impl MigrationEngine {
    pub fn new(parts: EngineParts) -> Self {
        let links = LinkManager::new();
        let updater = Arc::new(RegistryUpdater::new(parts.registry, parts.registry_backup_dir));

        Self {
            planner: Planner::new(parts.naming.clone(), parts.space).with_elevation(parts.elevated),
            executor: Executor::new(links.clone(), updater.clone(), parts.log.clone()),
            rollback: RollbackCoordinator::new(links, updater, parts.log.clone()),
            naming: parts.naming,
            log: parts.log,
        }
    }

    /// Engine backed by the host's disks, registry and the configured log.
    ///
    /// Symlink privilege is probed here, once, when the config leaves it unset.
    pub fn from_config(config: &Config) -> Self {
        Self::new(EngineParts {
            naming: Arc::new(TemplateNamingEngine),
            space: Arc::new(DiskSpaceProbe),
            registry: host_registry(config),
            log: Arc::new(JsonOperationLog::new(&config.operations_dir)),
            registry_backup_dir: config.registry_backup_dir.clone(),
            elevated: Some(config.elevated.unwrap_or_else(can_create_symlinks)),
        })
    }

    pub async fn create_plan(
        &self,
        entry: &SoftwareEntry,
        target_base: &Path,
        template: &str,
    ) -> Result<MigrationPlan> {
        self.planner.create_plan(entry, target_base, template).await
    }

    pub async fn execute(
        &self,
        plan: &MigrationPlan,
        options: &MigrationOptions,
        progress: Option<ProgressSink>,
        cancel: Option<CancellationToken>,
    ) -> MigrationResult {
        self.executor.execute(plan, options, progress, cancel).await
    }

    pub async fn rollback(&self, operation_id: &str, cancel: Option<CancellationToken>) -> RollbackResult {
        self.rollback.rollback(operation_id, cancel).await
    }

    pub fn naming(&self) -> &dyn NamingEngine {
        self.naming.as_ref()
    }

    pub fn operation_log(&self) -> &dyn OperationLog {
        self.log.as_ref()
    }
}

#[cfg(windows)]
fn host_registry(config: &Config) -> Arc<dyn RegistryStore> {
    Arc::new(crate::services::registry::WindowsRegistry::new(
        config.registry_search_keys.clone(),
    ))
}

#[cfg(not(windows))]
fn host_registry(_config: &Config) -> Arc<dyn RegistryStore> {
    tracing::debug!("No system registry on this host, using an empty in-memory registry");
    Arc::new(crate::services::registry::MemoryRegistry::new())
}
