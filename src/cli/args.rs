//! Command line argument definitions.

use crate::models::link::LinkType;
use crate::models::options::{ConflictPolicy, LockedFilePolicy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// App Relocator - Move installed applications to another drive
#[derive(Parser, Debug)]
#[command(name = "app-relocator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a migration plan for an install directory
    Plan {
        /// Install directory to move
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Base directory the application is moved under
        #[arg(short, long, value_name = "TARGET")]
        target: Option<PathBuf>,

        /// Naming template for the new directory, e.g. "{Vendor} - {Name}"
        #[arg(long, value_name = "TEMPLATE")]
        template: Option<String>,

        /// Display name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Version used by the {Version} token
        #[arg(long)]
        version_label: Option<String>,

        /// Vendor used by the {Vendor} token
        #[arg(long)]
        vendor: Option<String>,

        /// Output path for plan.json
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Execute a plan file
    Execute {
        /// Path to the plan.json file
        #[arg(value_name = "PLAN_FILE")]
        plan_file: PathBuf,

        /// Link type: junction or symlink (default: configured or recommended)
        #[arg(long, value_name = "TYPE")]
        link_type: Option<LinkType>,

        /// Do not rewrite registry references
        #[arg(long)]
        no_registry: bool,

        /// Skip checksum verification of copied files
        #[arg(long)]
        no_verify: bool,

        /// Existing destination file: skip, overwrite or rename
        #[arg(long, value_name = "POLICY", default_value = "skip")]
        on_conflict: ConflictPolicy,

        /// Unreadable source file: skip or abort
        #[arg(long, value_name = "POLICY", default_value = "skip")]
        on_locked: LockedFilePolicy,
    },

    /// Roll back a recorded operation
    Rollback {
        /// Operation ID printed by execute
        #[arg(value_name = "OPERATION_ID")]
        operation_id: String,
    },

    /// Inspect recorded operations
    Operations {
        #[command(subcommand)]
        action: OperationsAction,
    },

    /// List preset naming templates
    Templates,
}

#[derive(Subcommand, Debug)]
pub enum OperationsAction {
    /// List all operations
    List,

    /// Show one operation
    Show {
        /// Operation ID
        #[arg(value_name = "OPERATION_ID")]
        operation_id: String,
    },
}
