//! Environment checks run before planning or executing.
//!
//! A check either passes, passes with a caveat the user should know about,
//! or fails and blocks the command.

mod links;
mod registry;
mod storage;

use crate::models::config::Config;
use crate::Result;
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Passed,
    Degraded,
    Failed,
}

/// Outcome of one preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn passed(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Passed,
            message: message.into(),
            hint: None,
        }
    }

    pub fn degraded(name: &'static str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Degraded,
            hint: Some(hint.into()),
            ..Self::passed(name, message)
        }
    }

    pub fn failed(name: &'static str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Failed,
            hint: Some(hint.into()),
            ..Self::passed(name, message)
        }
    }
}

/// Run every check against the configured directories and host.
pub async fn run_preflight_checks(config: &Config) -> Result<Vec<CheckResult>> {
    let operations_dir = config.operations_dir.clone();
    let backup_dir = config.registry_backup_dir.clone();
    let elevated = config.elevated;

    // Probes touch the filesystem; keep them off the runtime threads.
    let mut results = tokio::task::spawn_blocking(move || {
        vec![
            storage::check(&operations_dir, "Operation log"),
            storage::check(&backup_dir, "Registry backups"),
            links::check(elevated),
        ]
    })
    .await
    .map_err(|e| crate::Error::other(format!("preflight task aborted: {}", e)))?;

    results.push(registry::check(config));
    Ok(results)
}

pub fn print_results(results: &[CheckResult]) {
    for result in results {
        let tag = match result.status {
            CheckStatus::Passed => "[OK]".green(),
            CheckStatus::Degraded => "[WARN]".yellow(),
            CheckStatus::Failed => "[FAIL]".red(),
        };
        println!("{} {}: {}", tag, result.name.bold(), result.message);
        if let Some(hint) = &result.hint {
            println!("  {} {}", "->".yellow(), hint);
        }
    }
}

/// True unless a check failed outright.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.status != CheckStatus::Failed)
}
