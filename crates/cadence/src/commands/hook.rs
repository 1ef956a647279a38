//! Hook command.

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::info;

use cadence_config::Config;
use cadence_plugin::{Hook, ReleaseContext, RepositoryInfo};
use cadence_plugin_manager::PluginManager;

/// Arguments for the hook command.
#[derive(Debug, Args)]
pub struct HookArgs {
    /// Hook to run (e.g., pre-version, post-publish)
    pub hook: Hook,

    /// Version being released
    #[arg(long)]
    pub version: String,

    /// Version released before this one
    #[arg(long)]
    pub previous_version: Option<String>,

    /// Tag name (defaults to v<version>)
    #[arg(long)]
    pub tag: Option<String>,

    /// Release type (major, minor, patch, ...)
    #[arg(long)]
    pub release_type: Option<String>,

    /// Repository as owner/name
    #[arg(long)]
    pub repository: Option<String>,

    /// Branch being released
    #[arg(long)]
    pub branch: Option<String>,

    /// Commit being released
    #[arg(long)]
    pub commit: Option<String>,

    /// Ask plugins not to make changes
    #[arg(short, long)]
    pub dry_run: bool,
}

impl HookArgs {
    fn context(&self) -> Result<ReleaseContext> {
        let tag = self
            .tag
            .clone()
            .unwrap_or_else(|| format!("v{}", self.version));
        let mut context = ReleaseContext::new(&self.version).with_tag_name(tag);

        if let Some(previous) = &self.previous_version {
            context = context.with_previous_version(previous);
        }
        if let Some(release_type) = &self.release_type {
            context = context.with_release_type(release_type);
        }
        if let Some(repository) = &self.repository {
            let Some((owner, name)) = repository.split_once('/') else {
                bail!("repository must be owner/name, got {repository}");
            };
            context = context.with_repository(RepositoryInfo::new(owner, name));
        }
        if self.branch.is_some() || self.commit.is_some() {
            context = context.with_commit(
                self.branch.clone().unwrap_or_default(),
                self.commit.clone().unwrap_or_default(),
            );
        }
        Ok(context)
    }
}

/// Runs the hook command.
pub fn run(args: HookArgs, config: Config) -> Result<()> {
    super::runtime()?.block_on(run_async(args, config))
}

async fn run_async(args: HookArgs, config: Config) -> Result<()> {
    let context = args.context()?;
    let mut manager = PluginManager::new(config).context("failed to initialize plugin manager")?;
    let context = manager.scoped_context(context);

    let failures = manager.load_all().await;
    if !failures.is_empty() {
        manager.shutdown().await;
        bail!("{} plugin(s) could not be loaded", failures.len());
    }

    if args.dry_run {
        println!("Dry run: plugins are asked not to make changes.\n");
    }
    info!(hook = %args.hook, version = %context.version, "Running hook");

    let outcomes = manager
        .execute_hook(args.hook, &context, args.dry_run)
        .await;
    manager.shutdown().await;

    if outcomes.is_empty() {
        println!("No plugin handles {}.", args.hook);
        return Ok(());
    }

    let mut failed = 0;
    for outcome in &outcomes {
        let elapsed = outcome.elapsed.as_millis();
        match (&outcome.result, outcome.failure()) {
            (Ok(response), None) => {
                println!("{}: ok ({elapsed} ms) {}", outcome.plugin, response.message);
                for artifact in &response.artifacts {
                    println!("  artifact {} -> {}", artifact.name, artifact.path);
                }
            }
            (_, reason) => {
                failed += 1;
                println!(
                    "{}: failed ({elapsed} ms) {}",
                    outcome.plugin,
                    reason.unwrap_or_default()
                );
            }
        }
    }

    if failed > 0 {
        bail!("{failed} plugin(s) failed on {}", args.hook);
    }
    Ok(())
}
