//! Plan command implementation.
//!
//! Builds a software entry for an install directory, plans its migration and
//! saves the plan as JSON.

use crate::core::planner;
use crate::core::scanner::entry_from_directory;
use crate::core::MigrationEngine;
use crate::models::config::Config;
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Options of the plan command besides the source.
#[derive(Debug, Default)]
pub struct PlanArgs<'a> {
    pub target: Option<&'a Path>,
    pub template: Option<&'a str>,
    pub name: Option<&'a str>,
    pub version: Option<&'a str>,
    pub vendor: Option<&'a str>,
    pub output: Option<&'a Path>,
}

/// Execute the plan command.
pub async fn plan(config: &Config, source: &Path, args: PlanArgs<'_>) -> Result<()> {
    println!("{}", "[PLAN] Planning migration...".bold().cyan());
    println!();

    let mut entry = entry_from_directory(source)?;
    if let Some(name) = args.name {
        entry.name = name.to_string();
    }
    if let Some(version) = args.version {
        entry = entry.with_version(version);
    }
    if let Some(vendor) = args.vendor {
        entry = entry.with_vendor(vendor);
    }

    let target_base = args
        .target
        .map(Path::to_path_buf)
        .or_else(|| config.default_target_path.clone())
        .ok_or_else(|| {
            crate::Error::Config("no target given and no default_target_path configured".to_string())
        })?;
    let template = args.template.unwrap_or(&config.naming_template);

    println!("  {} {}", "Source:".bold(), source.display());
    println!("  {} {}", "Target base:".bold(), target_base.display());
    println!("  {} {}", "Template:".bold(), template);
    println!();

    let engine = MigrationEngine::from_config(config);
    let plan = engine.create_plan(&entry, &target_base, template).await?;

    println!("{}", "[Plan Summary]".bold().green());
    println!("  {} {}", "Target:".bold(), plan.target_path.display());
    println!("  {} {}", "Files:".bold(), plan.file_operations.len());
    println!("  {} {}", "Size:".bold(), format_bytes(plan.total_size_bytes));
    println!("  {} {}", "Available:".bold(), format_bytes(plan.available_space_bytes));
    println!("  {} {}", "Recommended link:".bold(), plan.recommended_link_type);
    if !plan.fits() {
        println!(
            "  {}",
            "[WARNING] Not enough free space at the target".bold().yellow()
        );
    }
    println!();

    let output = args
        .output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| planner::default_plan_path(&entry));
    planner::save_plan(&plan, &output)?;
    println!("{} {}", "[OK] Plan saved to:".bold().green(), output.display());

    println!();
    println!("{}", "[Next Steps]".bold().yellow());
    println!(
        "  To run the migration: {}",
        format!("app-relocator execute {}", output.display()).cyan()
    );

    Ok(())
}

/// Human readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
