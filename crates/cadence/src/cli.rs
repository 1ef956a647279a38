//! CLI definition.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Run release lifecycle hooks through out-of-process plugins.
#[derive(Debug, Parser)]
#[command(name = "cadence")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to cadence.toml (searched upwards from the current directory by default)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect and validate plugins
    Plugin(commands::plugin::PluginArgs),

    /// Run one lifecycle hook on every plugin that handles it
    Hook(commands::hook::HookArgs),
}

impl Cli {
    /// Runs the CLI command.
    pub fn run(self) -> Result<()> {
        let config = commands::load_config(self.config.as_deref())?;
        match self.command {
            Commands::Plugin(args) => commands::plugin::run(args, config),
            Commands::Hook(args) => commands::hook::run(args, config),
        }
    }
}
