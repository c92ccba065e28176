//! Plan generation module.
//!
//! Builds a `MigrationPlan` for one software entry:
//! 1. Render the destination directory name
//! 2. Enumerate the install tree
//! 3. Map every file to its destination
//! 4. Query free space at the target volume
//! 5. Pick the link type suited to this host
//!
//! Planning never touches the filesystem beyond reading it.

use crate::core::link::LinkManager;
use crate::core::scanner::scan_source;
use crate::generators::naming::NamingEngine;
use crate::models::link::LinkType;
use crate::models::plan::{FileMoveOperation, MigrationPlan};
use crate::models::software::SoftwareEntry;
use crate::services::disk::SpaceProbe;
use crate::utils::fs::is_dir_empty;
use crate::Result;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Plan generator.
pub struct Planner {
    naming: Arc<dyn NamingEngine>,
    space: Arc<dyn SpaceProbe>,
    /// Known elevation capability. Unknown is treated as not elevated.
    elevated: Option<bool>,
}

impl Planner {
    pub fn new(naming: Arc<dyn NamingEngine>, space: Arc<dyn SpaceProbe>) -> Self {
        Self {
            naming,
            space,
            elevated: None,
        }
    }

    /// Set the elevation capability used to pick the recommended link type.
    pub fn with_elevation(mut self, elevated: Option<bool>) -> Self {
        self.elevated = elevated;
        self
    }

    /// Create a plan moving `entry` under `target_base`.
    pub async fn create_plan(
        &self,
        entry: &SoftwareEntry,
        target_base: &Path,
        template: &str,
    ) -> Result<MigrationPlan> {
        let source = entry.install_path.clone();
        tracing::info!("Planning migration of {} from {:?}", entry.name, source);

        if LinkManager::new().get_link_info(&source).is_some() {
            return Err(crate::Error::Planning(format!(
                "source is already a link: {}",
                source.display()
            )));
        }

        let name = self.naming.generate_name(entry, template);
        let target = target_base.join(&name);
        tracing::info!("Target directory: {:?}", target);

        check_target(&source, &target)?;

        for related in &entry.related_directories {
            if !related.path.starts_with(&source) {
                tracing::warn!(
                    "{} directory {:?} is outside the install path and will not be moved",
                    related.kind,
                    related.path
                );
            }
        }

        let scan_root = source.clone();
        let scan = tokio::task::spawn_blocking(move || scan_source(&scan_root))
            .await
            .map_err(|e| crate::Error::other(format!("scan task failed: {}", e)))??;

        let file_operations: Vec<FileMoveOperation> = scan
            .files
            .iter()
            .map(|f| FileMoveOperation {
                source_path: f.path.clone(),
                target_path: target.join(&f.relative),
                size_bytes: f.size,
            })
            .collect();
        let directories: Vec<PathBuf> = scan.directories.iter().map(|d| target.join(d)).collect();

        let available = self.space.available_space(&target)?;
        let recommended_link_type = if self.elevated.unwrap_or(false) {
            LinkType::SymbolicLink
        } else {
            LinkType::Junction
        };

        let plan = MigrationPlan {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339(),
            software: entry.clone(),
            source_path: source,
            target_path: target,
            file_operations,
            directories,
            total_size_bytes: scan.total_size,
            available_space_bytes: available,
            recommended_link_type,
        };

        tracing::info!(
            "Plan {}: {} files, {} bytes, {} bytes available, recommended {}",
            plan.id,
            plan.file_operations.len(),
            plan.total_size_bytes,
            plan.available_space_bytes,
            plan.recommended_link_type
        );
        if !plan.fits() {
            tracing::warn!("Target volume is too small for {}", entry.name);
        }

        Ok(plan)
    }
}

/// Reject targets that would overlap the source or clobber existing content.
fn check_target(source: &Path, target: &Path) -> Result<()> {
    if !source.exists() {
        return Err(crate::Error::Planning(format!(
            "source path does not exist: {}",
            source.display()
        )));
    }

    let source_abs = source.canonicalize().map_err(|e| {
        crate::Error::Planning(format!("source path is inaccessible: {}: {}", source.display(), e))
    })?;
    let target_abs = resolve_lexically(target);
    if target_abs.starts_with(&source_abs) || target.starts_with(source) {
        return Err(crate::Error::Planning(format!(
            "target {} is inside the source directory",
            target.display()
        )));
    }

    if target.exists() && !(target.is_dir() && is_dir_empty(target)) {
        return Err(crate::Error::Planning(format!(
            "target path already exists and is not empty: {}",
            target.display()
        )));
    }

    Ok(())
}

/// Canonicalize the longest existing prefix of `path`.
fn resolve_lexically(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = current.canonicalize() {
            return missing.iter().rev().fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Save a plan to a JSON file.
pub fn save_plan(plan: &MigrationPlan, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(plan)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    file.write_all(json.as_bytes())?;

    tracing::info!("Plan saved to {:?}", path);
    Ok(())
}

/// Load a plan from a JSON file and check its invariants.
pub fn load_plan(path: &Path) -> Result<MigrationPlan> {
    let content = fs::read_to_string(path)?;
    let plan: MigrationPlan = serde_json::from_str(&content)?;
    plan.validate()?;
    Ok(plan)
}

/// Default plan output path in the current directory.
pub fn default_plan_path(entry: &SoftwareEntry) -> PathBuf {
    let name = crate::generators::naming::sanitize_filename(&entry.name);
    PathBuf::from(format!("plan_{}_{}.json", name, Utc::now().format("%Y%m%d_%H%M%S")))
}
