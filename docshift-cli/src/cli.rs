//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use docshift_core::{DowngradeTarget, UpgradeTarget};

#[derive(Parser, Debug)]
#[command(name = "docshift", author, version, about = "Versioned schema migrations for MongoDB", long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to docshift.yaml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the migrations directory and the version collection
    Init,

    /// Create a new migration file after the latest one
    Create {
        /// Title of the migration
        title: String,
    },

    /// Apply pending migrations
    Upgrade(UpgradeArgs),

    /// Revert applied migrations
    Downgrade(DowngradeArgs),

    /// Show every migration and whether it is applied
    History,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct UpgradeArgs {
    /// Apply every pending migration (default)
    #[arg(long, conflicts_with = "to")]
    pub all: bool,

    /// Apply pending migrations up to and including VERSION
    #[arg(long, value_name = "VERSION")]
    pub to: Option<String>,
}

impl UpgradeArgs {
    pub fn target(&self) -> UpgradeTarget {
        match &self.to {
            Some(version) => UpgradeTarget::Version(version.clone()),
            None => UpgradeTarget::Latest,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DowngradeArgs {
    /// Revert every applied migration
    #[arg(long, conflicts_with = "to")]
    pub all: bool,

    /// Revert until VERSION is the current version
    #[arg(long, value_name = "VERSION")]
    pub to: Option<String>,
}

impl DowngradeArgs {
    /// One step back unless `--all` or `--to` says otherwise
    pub fn target(&self) -> DowngradeTarget {
        match (&self.to, self.all) {
            (Some(version), _) => DowngradeTarget::Version(version.clone()),
            (None, true) => DowngradeTarget::All,
            (None, false) => DowngradeTarget::Previous,
        }
    }
}
