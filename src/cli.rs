// src/cli.rs
//! CLI definitions for installorder
//!
//! The actual command implementations live in `main.rs`.

use clap::{Args, Parser, Subcommand};
use installorder::{ConfigureMode, ManagerConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "installorder")]
#[command(version)]
#[command(about = "Order and drive package transactions described by a scenario file", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging and warnings for unsatisfied dependencies
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Order and run the transaction, printing each operation
    Order {
        /// Path to the scenario file
        scenario: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// List the archives the transaction needs, in install order
    Archives {
        /// Path to the scenario file
        scenario: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Keep packages whose archives are missing, then order what is left
    FixMissing {
        /// Path to the scenario file
        scenario: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Print the effective manager configuration as TOML
    Config {
        /// Path to the scenario file
        scenario: PathBuf,

        #[command(flatten)]
        policy: PolicyArgs,
    },
}

impl Commands {
    pub fn scenario(&self) -> &PathBuf {
        match self {
            Commands::Order { scenario, .. }
            | Commands::Archives { scenario, .. }
            | Commands::FixMissing { scenario, .. }
            | Commands::Config { scenario, .. } => scenario,
        }
    }

    pub fn policy(&self) -> &PolicyArgs {
        match self {
            Commands::Order { policy, .. }
            | Commands::Archives { policy, .. }
            | Commands::FixMissing { policy, .. }
            | Commands::Config { policy, .. } => policy,
        }
    }
}

/// Overrides for the policy knobs read from the scenario
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Read the policy from this file instead of the scenario's [manager] table
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Configure every package right after it is unpacked
    #[arg(long)]
    pub immediate_configure_all: bool,

    /// Do not configure essential and important packages immediately
    #[arg(long)]
    pub no_immediate_configure: bool,

    /// Allow temporary removal of essential packages to break loops
    #[arg(long)]
    pub force_loop_break: bool,

    /// Sort by pre-dependencies only
    #[arg(long)]
    pub critical_only: bool,

    /// When to run the configure primitive (all, smart, no)
    #[arg(long)]
    pub configure: Option<ConfigureMode>,
}

impl PolicyArgs {
    /// Apply the command-line overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut ManagerConfig, debug: bool) {
        if self.immediate_configure_all {
            config.immediate_configure_all = true;
        }
        if self.no_immediate_configure {
            config.immediate_configure = false;
        }
        if self.force_loop_break {
            config.force_loop_break = true;
        }
        if self.critical_only {
            config.unpack_all = false;
        }
        if let Some(mode) = self.configure {
            config.configure = mode;
        }
        if debug {
            config.debug = true;
        }
    }
}
