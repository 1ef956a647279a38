//! Plugin inspection commands.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};

use cadence_config::{Config, PluginEntry};
use cadence_plugin_manager::{PluginManager, PluginStorage};

/// Plugin inspection commands.
#[derive(Debug, Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub command: PluginCommand,
}

#[derive(Debug, Subcommand)]
pub enum PluginCommand {
    /// List configured plugins and plugin binaries on disk
    List,

    /// Start a plugin and show what it declares
    Info(InfoArgs),

    /// Validate plugin configuration
    Validate(ValidateArgs),
}

/// Arguments for the `plugin info` command.
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Plugin name
    pub name: String,
}

/// Arguments for the `plugin validate` command.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Plugin name (validates all configured plugins if not specified)
    pub name: Option<String>,
}

/// Runs the plugin command.
pub fn run(args: PluginArgs, config: Config) -> Result<()> {
    match args.command {
        PluginCommand::List => list(&config),
        PluginCommand::Info(args) => super::runtime()?.block_on(info(args, config)),
        PluginCommand::Validate(args) => super::runtime()?.block_on(validate(args, config)),
    }
}

fn list(config: &Config) -> Result<()> {
    let storage = PluginStorage::with_dir(config.host.plugin_dir())
        .context("failed to initialize plugin storage")?;

    if config.plugins.is_empty() {
        println!("No plugins configured.");
    } else {
        println!("Configured plugins:\n");
        for entry in &config.plugins {
            let state = if entry.enabled { "" } else { " (disabled)" };
            match storage.resolve(entry) {
                Ok(path) => println!("  {}{state}  {}", entry.name, path.display()),
                Err(_) => println!("  {}{state}  (binary not found)", entry.name),
            }
        }
    }

    let discovered = storage
        .list()
        .context("failed to list plugin directory")?;
    println!();
    if discovered.is_empty() {
        println!("No plugin binaries in {}", storage.plugins_dir().display());
    } else {
        println!("Plugin binaries in {}:\n", storage.plugins_dir().display());
        for plugin in discovered {
            println!("  {}", plugin.name);
        }
    }

    Ok(())
}

/// Returns the configured entry for `name`, or a bare entry for an
/// unconfigured binary in the plugin directory.
fn entry_for(config: &Config, name: &str) -> PluginEntry {
    config
        .plugin(name)
        .cloned()
        .unwrap_or_else(|| PluginEntry::new(name))
}

async fn info(args: InfoArgs, config: Config) -> Result<()> {
    let entry = entry_for(&config, &args.name);
    let mut manager = PluginManager::new(config).context("failed to initialize plugin manager")?;

    let loaded = manager
        .load(entry)
        .await
        .with_context(|| format!("failed to load plugin {}", args.name))?;

    let info = &loaded.info;
    println!("Name:        {}", info.name);
    println!("Version:     {}", info.version);
    if !info.description.is_empty() {
        println!("Description: {}", info.description);
    }
    if !info.author.is_empty() {
        println!("Author:      {}", info.author);
    }
    println!("Path:        {}", loaded.process.path().display());
    println!("\nHooks:");
    for hook in &info.hooks {
        println!("  - {hook}");
    }
    if let Some(schema) = &info.config_schema {
        println!("\nConfig schema:\n{schema}");
    }

    manager.shutdown().await;
    Ok(())
}

async fn validate(args: ValidateArgs, config: Config) -> Result<()> {
    let mut manager = PluginManager::new(config.clone())
        .context("failed to initialize plugin manager")?;

    let outcomes = if let Some(name) = &args.name {
        let Some(entry) = config.plugin(name).cloned() else {
            bail!("plugin {name} is not configured");
        };
        manager
            .load(entry)
            .await
            .with_context(|| format!("failed to load plugin {name}"))?;
        manager.validate_all().await
    } else {
        let failures = manager.load_all().await;
        for failure in &failures {
            println!("{}: failed to load ({})", failure.plugin, failure.error);
        }
        if !failures.is_empty() {
            manager.shutdown().await;
            bail!("{} plugin(s) could not be loaded", failures.len());
        }
        manager.validate_all().await
    };

    if outcomes.is_empty() {
        println!("No plugins to validate.");
    }

    let mut invalid = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(response) if response.valid => println!("{}: ok", outcome.plugin),
            Ok(response) => {
                invalid += 1;
                println!("{}: invalid", outcome.plugin);
                for error in &response.errors {
                    println!("  - {}: {} [{}]", error.field, error.message, error.code);
                }
            }
            Err(e) => {
                invalid += 1;
                println!("{}: error ({e})", outcome.plugin);
            }
        }
    }

    manager.shutdown().await;

    if invalid > 0 {
        bail!("{invalid} plugin configuration(s) invalid");
    }
    Ok(())
}
