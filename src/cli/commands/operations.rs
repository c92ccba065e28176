//! Operations command implementation.
//!
//! Lists and shows records stored in the operation log.

use crate::core::operation_log::{JsonOperationLog, OperationLog};
use crate::models::config::Config;
use crate::Result;
use colored::Colorize;

/// List all operations.
pub async fn list_operations(config: &Config) -> Result<()> {
    println!("{}", "[OPERATIONS]".bold().cyan());
    println!();

    let log = JsonOperationLog::new(&config.operations_dir);
    let mut records = log.list()?;

    if records.is_empty() {
        println!("No operations found.");
        return Ok(());
    }

    records.reverse(); // Most recent first

    println!(
        "{:<38} {:<10} {:<9} {:<20} {}",
        "Operation ID".bold(),
        "Type".bold(),
        "Status".bold(),
        "Started".bold(),
        "Description".bold()
    );
    println!("{}", "-".repeat(100));

    for record in records {
        let status = match record.success {
            Some(true) => "ok".green(),
            Some(false) => "failed".red(),
            None => "open".yellow(),
        };
        println!(
            "{:<38} {:<10} {:<9} {:<20} {}",
            record.id,
            record.op_type.to_string(),
            status,
            record.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.description
        );
    }

    println!();
    println!("Operations directory: {}", log.dir().display());

    Ok(())
}

/// Show details of a specific operation.
pub async fn show_operation(config: &Config, operation_id: &str) -> Result<()> {
    println!("{} {}", "[OPERATION]".bold().cyan(), operation_id);
    println!();

    let log = JsonOperationLog::new(&config.operations_dir);
    let record = log
        .get(operation_id)?
        .ok_or_else(|| crate::Error::OperationNotFound(operation_id.to_string()))?;

    println!("  {} {}", "Type:".bold(), record.op_type);
    println!("  {} {}", "Description:".bold(), record.description);
    println!("  {} {}", "Started:".bold(), record.started_at.to_rfc3339());
    if let Some(ended) = record.ended_at {
        println!("  {} {}", "Ended:".bold(), ended.to_rfc3339());
    }
    println!(
        "  {} {}",
        "Success:".bold(),
        record.success.map(|s| s.to_string()).unwrap_or_else(|| "open".to_string())
    );
    if let Some(ref of) = record.rollback_of {
        println!("  {} {}", "Rollback of:".bold(), of);
    }
    println!();

    println!("{} ({})", "Actions:".bold(), record.actions.len());
    for (i, action) in record.actions.iter().enumerate() {
        let marker = if action.can_rollback { "*" } else { " " };
        println!("  {:>4}.{} {}", i + 1, marker, action.description);
    }

    let rollbacks = log.find_rollback_of(operation_id)?;
    if !rollbacks.is_empty() {
        println!();
        println!("{}", "Rollbacks:".bold());
        for rb in rollbacks {
            println!(
                "  {} ({})",
                rb.id,
                rb.success.map(|s| if s { "ok" } else { "failed" }).unwrap_or("open")
            );
        }
    }

    Ok(())
}
