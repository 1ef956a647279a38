//! Loading configured plugins and dispatching hooks to them.

use std::time::{Duration, Instant};

use cadence_config::{Config, PluginEntry};
use cadence_plugin::{
    ExecuteRequest, ExecuteResponse, Hook, ProgressKind, ReleaseContext, ValidateResponse,
};
use cadence_rpc::{CallOptions, PluginProcess, SupervisorConfig};
use tracing::{debug, error, info, warn};

use crate::registry::{LoadedPlugin, PluginRegistry};
use crate::storage::PluginStorage;
use crate::{PluginManagerError, PluginManagerResult};

/// A plugin that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub plugin: String,
    pub error: PluginManagerError,
}

/// Result of one plugin's handling of a hook.
#[derive(Debug)]
pub struct HookOutcome {
    pub plugin: String,
    pub result: PluginManagerResult<ExecuteResponse>,
    pub elapsed: Duration,
}

impl HookOutcome {
    /// Returns true if the call went through and the plugin reported success.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_ok_and(|response| response.success)
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        match &self.result {
            Ok(response) if response.success => None,
            Ok(response) => Some(
                response
                    .error
                    .clone()
                    .unwrap_or_else(|| response.message.clone()),
            ),
            Err(e) => Some(e.to_string()),
        }
    }
}

/// Result of validating one plugin's configuration.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub plugin: String,
    pub result: PluginManagerResult<ValidateResponse>,
}

/// Owns the plugin processes of one host session.
#[derive(Debug)]
pub struct PluginManager {
    config: Config,
    storage: PluginStorage,
    registry: PluginRegistry,
}

impl PluginManager {
    /// Creates a manager resolving binaries from the configured plugin
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin directory cannot be created.
    pub fn new(config: Config) -> PluginManagerResult<Self> {
        let storage = PluginStorage::with_dir(config.host.plugin_dir())?;
        Ok(Self::with_storage(config, storage))
    }

    #[must_use]
    pub fn with_storage(config: Config, storage: PluginStorage) -> Self {
        Self {
            config,
            storage,
            registry: PluginRegistry::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &PluginStorage {
        &self.storage
    }

    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Process settings derived from the `[host]` table.
    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let host = &self.config.host;
        SupervisorConfig::default()
            .with_startup_timeout(host.startup_timeout())
            .with_get_info_timeout(host.get_info_timeout())
            .with_shutdown_grace(host.shutdown_grace())
    }

    /// Fills the context environment with the allow-listed host variables.
    #[must_use]
    pub fn scoped_context(&self, context: ReleaseContext) -> ReleaseContext {
        context.with_filtered_environment(std::env::vars(), &self.config.host.env_allowlist)
    }

    /// Loads every enabled plugin. Failures are logged and returned; the
    /// remaining plugins are still loaded.
    pub async fn load_all(&mut self) -> Vec<LoadFailure> {
        let entries: Vec<PluginEntry> = self.config.enabled_plugins().cloned().collect();
        let mut failures = Vec::new();
        for entry in entries {
            let name = entry.name.clone();
            if let Err(error) = self.load(entry).await {
                error!(plugin = %name, "Failed to load plugin: {error}");
                failures.push(LoadFailure {
                    plugin: name,
                    error,
                });
            }
        }
        failures
    }

    /// Starts one plugin and records what it declares.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin is already loaded, its binary is
    /// missing, it fails to start, or it does not describe itself.
    pub async fn load(&mut self, entry: PluginEntry) -> PluginManagerResult<&LoadedPlugin> {
        if self.registry.contains(&entry.name) {
            return Err(PluginManagerError::AlreadyLoaded { name: entry.name });
        }
        let path = self.storage.resolve(&entry)?;
        let process = PluginProcess::spawn(&entry.name, &path, &self.supervisor_config())
            .await
            .map_err(|source| PluginManagerError::Start {
                name: entry.name.clone(),
                source,
            })?;
        let info = process.client().get_info().await;
        if info.is_empty() {
            warn!(plugin = %entry.name, "Plugin returned no info, stopping it");
            if let Err(e) = process.shutdown().await {
                debug!(plugin = %entry.name, "Shutdown after empty info failed: {e}");
            }
            return Err(PluginManagerError::NoInfo { name: entry.name });
        }
        if info.name != entry.name {
            debug!(plugin = %entry.name, declared = %info.name, "Plugin declares a different name");
        }
        info!(
            plugin = %entry.name,
            version = %info.version,
            hooks = info.hooks.len(),
            "Loaded plugin"
        );

        let name = entry.name.clone();
        self.registry.insert(LoadedPlugin {
            entry,
            info,
            process,
        });
        self.registry
            .get(&name)
            .ok_or(PluginManagerError::PluginNotFound { name })
    }

    /// Runs `hook` on every plugin that handles it, one after another in
    /// configuration order.
    ///
    /// A failing plugin does not stop the others.
    pub async fn execute_hook(
        &self,
        hook: Hook,
        context: &ReleaseContext,
        dry_run: bool,
    ) -> Vec<HookOutcome> {
        let mut outcomes = Vec::new();
        for plugin in self.registry.supporting(hook) {
            let started = Instant::now();
            let result = run_hook(plugin, hook, context, dry_run).await;
            let outcome = HookOutcome {
                plugin: plugin.name().to_string(),
                result,
                elapsed: started.elapsed(),
            };
            match outcome.failure() {
                None => info!(plugin = %outcome.plugin, %hook, "Hook succeeded"),
                Some(reason) => warn!(plugin = %outcome.plugin, %hook, "Hook failed: {reason}"),
            }
            outcomes.push(outcome);
        }
        if outcomes.is_empty() {
            debug!(%hook, "No plugin handles this hook");
        }
        outcomes
    }

    /// Validates the configuration of one loaded plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin is not loaded, its configuration cannot
    /// be converted, or the call fails.
    pub async fn validate(&self, name: &str) -> PluginManagerResult<ValidateResponse> {
        let plugin = self
            .registry
            .get(name)
            .ok_or_else(|| PluginManagerError::PluginNotFound {
                name: name.to_string(),
            })?;
        validate_plugin(plugin).await
    }

    /// Validates the configuration of every loaded plugin.
    pub async fn validate_all(&self) -> Vec<ValidationOutcome> {
        let mut outcomes = Vec::with_capacity(self.registry.len());
        for plugin in self.registry.iter() {
            outcomes.push(ValidationOutcome {
                plugin: plugin.name().to_string(),
                result: validate_plugin(plugin).await,
            });
        }
        outcomes
    }

    /// Stops every plugin process.
    pub async fn shutdown(mut self) {
        for plugin in self.registry.drain() {
            let name = plugin.entry.name;
            match plugin.process.shutdown().await {
                Ok(status) => debug!(plugin = %name, %status, "Plugin stopped"),
                Err(e) => warn!(plugin = %name, "Failed to stop plugin: {e}"),
            }
        }
    }
}

async fn run_hook(
    plugin: &LoadedPlugin,
    hook: Hook,
    context: &ReleaseContext,
    dry_run: bool,
) -> PluginManagerResult<ExecuteResponse> {
    let request = ExecuteRequest::new(hook, context.clone())
        .with_config(plugin.entry.config_map()?)
        .dry_run(dry_run);

    let name = plugin.name().to_string();
    let options = CallOptions::new().with_progress(move |progress| match progress.kind {
        ProgressKind::Begin | ProgressKind::End => {
            info!(plugin = %name, "{}", progress.message);
        }
        ProgressKind::Report => {
            debug!(plugin = %name, percentage = progress.percentage, "{}", progress.message);
        }
    });

    plugin
        .process
        .client()
        .execute_with(&request, &options)
        .await
        .map_err(|source| PluginManagerError::Rpc {
            name: plugin.name().to_string(),
            source,
        })
}

async fn validate_plugin(plugin: &LoadedPlugin) -> PluginManagerResult<ValidateResponse> {
    let config = plugin.entry.config_map()?;
    plugin
        .process
        .client()
        .validate(&config)
        .await
        .map_err(|source| PluginManagerError::Rpc {
            name: plugin.name().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_config::HostConfig;
    use cadence_plugin::Artifact;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, plugins: Vec<PluginEntry>) -> PluginManager {
        let config = Config {
            host: HostConfig::default(),
            plugins,
        };
        let storage = PluginStorage::with_dir(dir.path()).unwrap();
        PluginManager::with_storage(config, storage)
    }

    #[test]
    fn test_supervisor_config_uses_host_settings() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir, vec![]);
        manager.config.host.startup_timeout_ms = 1_500;
        manager.config.host.get_info_timeout_ms = 250;

        let supervisor = manager.supervisor_config();
        assert_eq!(supervisor.startup_timeout, Duration::from_millis(1_500));
        assert_eq!(supervisor.get_info_timeout, Duration::from_millis(250));
        assert_eq!(supervisor.shutdown_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_scoped_context_keeps_explicit_fields() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, vec![]);
        let context =
            manager.scoped_context(ReleaseContext::new("1.2.0").with_tag_name("v1.2.0"));
        assert_eq!(context.version, "1.2.0");
        assert_eq!(context.tag_name, "v1.2.0");
        assert!(
            context
                .environment
                .keys()
                .all(|k| k.starts_with("CI") || k.starts_with("CADENCE_"))
        );
    }

    #[tokio::test]
    async fn test_load_all_reports_missing_binaries() {
        let dir = TempDir::new().unwrap();
        let mut disabled = PluginEntry::new("off");
        disabled.enabled = false;
        let mut manager = manager(&dir, vec![PluginEntry::new("ghost"), disabled]);

        let failures = manager.load_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].plugin, "ghost");
        assert!(matches!(
            failures[0].error,
            PluginManagerError::BinaryNotFound { .. }
        ));
        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_validate_unknown_plugin() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, vec![]);
        let result = manager.validate("ghost").await;
        assert!(matches!(
            result,
            Err(PluginManagerError::PluginNotFound { name }) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_execute_hook_without_plugins() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, vec![]);
        let outcomes = manager
            .execute_hook(Hook::PostPublish, &ReleaseContext::new("1.0.0"), false)
            .await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_hook_outcome_failure_reason() {
        let ok = HookOutcome {
            plugin: "a".to_string(),
            result: Ok(ExecuteResponse::success("done")
                .with_artifact(Artifact::new("pkg", "dist/pkg.tgz", "tarball"))),
            elapsed: Duration::ZERO,
        };
        let failed = HookOutcome {
            plugin: "b".to_string(),
            result: Ok(ExecuteResponse::failure("registry rejected upload")),
            elapsed: Duration::ZERO,
        };
        let broken = HookOutcome {
            plugin: "c".to_string(),
            result: Err(PluginManagerError::Rpc {
                name: "c".to_string(),
                source: cadence_rpc::RpcError::ConnectionClosed,
            }),
            elapsed: Duration::ZERO,
        };

        assert!(ok.succeeded());
        assert_eq!(ok.failure(), None);
        assert!(!failed.succeeded());
        assert_eq!(failed.failure().unwrap(), "registry rejected upload");
        assert_eq!(broken.failure().unwrap(), "call to plugin c failed");
    }
}
