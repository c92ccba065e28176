//! Execute command implementation.
//!
//! Reads a plan.json file, runs the migration with a progress bar and prints
//! the operation ID needed for rollback.

use crate::core::planner;
use crate::core::MigrationEngine;
use crate::models::config::Config;
use crate::models::link::LinkType;
use crate::models::options::{ConflictPolicy, LockedFilePolicy};
use crate::models::progress::MigrationProgress;
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Options of the execute command besides the plan file.
#[derive(Debug)]
pub struct ExecuteArgs {
    pub link_type: Option<LinkType>,
    pub no_registry: bool,
    pub no_verify: bool,
    pub on_conflict: ConflictPolicy,
    pub on_locked: LockedFilePolicy,
}

/// Execute a plan file.
pub async fn execute_plan(config: &Config, plan_file: &Path, args: ExecuteArgs) -> Result<()> {
    println!("{}", "[EXEC] Executing plan...".bold().cyan());
    println!();

    if !plan_file.exists() {
        return Err(crate::Error::PathNotFound(plan_file.display().to_string()));
    }

    println!("[INFO] Loading plan: {}", plan_file.display());
    let plan = planner::load_plan(plan_file)?;

    let mut options = config.migration_options(plan.recommended_link_type);
    if let Some(link_type) = args.link_type {
        options.link_type = link_type;
    }
    options.update_registry = options.update_registry && !args.no_registry;
    options.verify_integrity = options.verify_integrity && !args.no_verify;
    options.on_file_conflict = args.on_conflict;
    options.on_locked_file = args.on_locked;

    println!("  {} {}", "Software:".bold(), plan.software.name);
    println!("  {} {}", "Source:".bold(), plan.source_path.display());
    println!("  {} {}", "Target:".bold(), plan.target_path.display());
    println!("  {} {}", "Files:".bold(), plan.file_operations.len());
    println!("  {} {}", "Link:".bold(), options.link_type);
    println!();
    println!(
        "{}",
        "[WARNING] The source directory will be replaced by a link!".bold().yellow()
    );
    println!();

    let engine = MigrationEngine::from_config(config);
    let (tx, mut rx) = mpsc::unbounded_channel::<MigrationProgress>();
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let pb = ProgressBar::new(plan.total_size_bytes.max(1));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .map_err(|e| crate::Error::other(e.to_string()))?
            .progress_chars("█▓░"),
    );
    let bar = pb.clone();
    let reporter = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            bar.set_position(progress.bytes_transferred);
            let msg = match &progress.current_file {
                Some(file) => format!(
                    "{}: {}",
                    progress.state,
                    file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
                ),
                None => progress.state.to_string(),
            };
            bar.set_message(msg);
        }
    });

    let result = engine.execute(&plan, &options, Some(tx), Some(cancel)).await;
    let _ = reporter.await;
    pb.finish_with_message(result.state.to_string());
    println!();

    println!("{}", "[Execution Summary]".bold());
    println!("  {} {}", "Migrated:".bold(), result.migrated_files.len());
    println!("  {} {}", "Skipped:".bold(), result.skipped_files.len());
    println!("  {} {}", "Failed:".bold(), result.failed_files.len());
    if options.update_registry {
        println!(
            "  {} {} updated, {} failed",
            "Registry:".bold(),
            result.registry_updated,
            result.registry_failed
        );
    }
    if let Some(leftover) = &result.leftover_path {
        println!("  {} {}", "Leftovers:".bold(), leftover.display());
    }
    for file in result.skipped_files.iter().chain(result.failed_files.iter()).take(10) {
        println!("    - {}", file.display());
    }
    println!();

    if result.success {
        println!("{}", "[OK] Migration completed successfully!".bold().green());
    } else {
        println!(
            "{} {}",
            "[FAIL]".bold().red(),
            result.error_message.as_deref().unwrap_or("migration failed")
        );
    }

    if let Some(id) = &result.operation_id {
        println!();
        println!("{}", "[Next Steps]".bold().yellow());
        println!(
            "  To undo changes: {}",
            format!("app-relocator rollback {}", id).cyan()
        );
    }

    if result.success {
        Ok(())
    } else {
        Err(crate::Error::other(
            result.error_message.unwrap_or_else(|| "migration failed".to_string()),
        ))
    }
}
