//! Templates command implementation.

use crate::generators::naming::{NamingEngine, TemplateNamingEngine};
use crate::models::config::Config;
use crate::models::software::SoftwareEntry;
use crate::Result;
use colored::Colorize;

/// List preset naming templates with a sample rendering.
pub async fn list_templates(config: &Config) -> Result<()> {
    println!("{}", "[TEMPLATES]".bold().cyan());
    println!();

    let engine = TemplateNamingEngine;
    let sample = SoftwareEntry::new("example", "Example App", r"C:\Program Files\Example App")
        .with_version("2.1")
        .with_vendor("Contoso");

    for template in engine.preset_templates() {
        println!(
            "  {:<28} {:<30} {}",
            template.pattern.bold(),
            engine.generate_name(&sample, &template.pattern).green(),
            template.description
        );
    }

    println!();
    println!("Configured template: {}", config.naming_template.cyan());
    Ok(())
}
