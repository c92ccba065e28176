//! Rollback command implementation.
//!
//! Reverses a recorded migration by operation ID.

use crate::core::MigrationEngine;
use crate::models::config::Config;
use crate::Result;
use colored::Colorize;

/// Execute a rollback.
pub async fn rollback(config: &Config, operation_id: &str) -> Result<()> {
    println!("{}", "[ROLLBACK] Rollback command".bold().cyan());
    println!();

    let engine = MigrationEngine::from_config(config);
    if let Some(record) = engine.operation_log().get(operation_id)? {
        println!("  {} {}", "Operation:".bold(), record.description);
        println!("  {} {}", "Started:".bold(), record.started_at.to_rfc3339());
        println!("  {} {}", "Actions:".bold(), record.actions.len());
        println!();
    }

    println!(
        "{}",
        "[WARNING] This will reverse the recorded operation!".bold().yellow()
    );
    println!();

    let result = engine.rollback(operation_id, None).await;

    println!("{}", "[Rollback Summary]".bold());
    println!("  {} {}", "Reverted:".bold(), result.reverted_actions);
    println!("  {} {}", "Failed:".bold(), result.failed_files.len());
    for item in &result.failed_files {
        println!("    - {}", item);
    }
    println!();

    if result.success {
        println!("{}", "[OK] Rollback completed successfully!".green());
        Ok(())
    } else {
        let message = result
            .error_message
            .unwrap_or_else(|| "rollback failed".to_string());
        println!("{} {}", "[FAIL]".bold().red(), message);
        Err(crate::Error::other(message))
    }
}
