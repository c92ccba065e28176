//! App Relocator CLI
//!
//! A command-line tool for moving installed applications to another drive.

use app_relocator::cli::{
    args::{Cli, Commands, OperationsAction},
    commands::{execute, operations, plan, rollback, templates},
};
use app_relocator::models::config::{self, Config};
use app_relocator::preflight;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };

    // Run the appropriate command
    match cli.command {
        Commands::Plan {
            source,
            target,
            template,
            name,
            version_label,
            vendor,
            output,
        } => {
            if !cli.skip_preflight {
                run_preflight_checks(&config).await?;
            }

            let args = plan::PlanArgs {
                target: target.as_deref(),
                template: template.as_deref(),
                name: name.as_deref(),
                version: version_label.as_deref(),
                vendor: vendor.as_deref(),
                output: output.as_deref(),
            };
            plan::plan(&config, &source, args).await?;
        }

        Commands::Execute {
            plan_file,
            link_type,
            no_registry,
            no_verify,
            on_conflict,
            on_locked,
        } => {
            if !cli.skip_preflight {
                run_preflight_checks(&config).await?;
            }

            let args = execute::ExecuteArgs {
                link_type,
                no_registry,
                no_verify,
                on_conflict,
                on_locked,
            };
            execute::execute_plan(&config, &plan_file, args).await?;
        }

        Commands::Rollback { operation_id } => {
            rollback::rollback(&config, &operation_id).await?;
        }

        Commands::Operations { action } => match action {
            OperationsAction::List => {
                operations::list_operations(&config).await?;
            }
            OperationsAction::Show { operation_id } => {
                operations::show_operation(&config, &operation_id).await?;
            }
        },

        Commands::Templates => {
            templates::list_templates(&config).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("app_relocator=debug")
    } else {
        EnvFilter::new("app_relocator=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Run preflight checks and exit if any fail.
async fn run_preflight_checks(config: &Config) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config).await?;
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
