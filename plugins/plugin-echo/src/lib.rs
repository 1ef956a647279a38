//! Echo plugin.
//!
//! Handles every hook by reflecting the release context into its outputs.
//! It reports progress and streams log lines on each call, which makes it
//! the plugin integration tests drive through a real child process.
//!
//! Settings:
//! - `greeting` (required string): prefixed to every log line
//! - `fail_on` (list of hook names): hooks answered with a failure
//! - `delay_ms` (integer): cancellable pause before answering

use std::time::Duration;

use async_trait::async_trait;
use cadence_plugin::{
    Artifact, CallContext, ConfigAccessor, ConfigMap, ExecuteRequest, ExecuteResponse, Hook,
    Info, Plugin, PluginError, PluginResult, ValidateResponse,
};
use serde_json::Value;
use tracing::debug;

const CONFIG_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["greeting"],
  "properties": {
    "greeting": {"type": "string"},
    "fail_on": {"type": "array", "items": {"type": "string"}},
    "delay_ms": {"type": "integer", "minimum": 0}
  }
}"#;

/// Number of progress steps reported per call.
const STEPS: u64 = 3;

/// The echo plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoPlugin;

impl EchoPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn hook_list(config: &ConfigMap, key: &str) -> Vec<String> {
    ConfigAccessor::new(config).get_string_list(key, &[])
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn get_info(&self) -> Info {
        Info::new("echo", env!("CARGO_PKG_VERSION"))
            .with_description("Echoes the release context back to the host")
            .with_author("Cadence contributors")
            .with_hooks(Hook::ALL)
            .with_config_schema(CONFIG_SCHEMA)
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        request: ExecuteRequest,
    ) -> PluginResult<ExecuteResponse> {
        let config = ConfigAccessor::new(&request.config);
        let greeting = config.get_string("greeting", "hello");
        let hook = request.hook;
        let context = &request.context;
        debug!(%hook, version = %context.version, "echo called");

        ctx.logger()
            .info(format!("{greeting} from {hook} for {}", context.version));

        let token = ctx.progress().start(STEPS, &format!("echoing {hook}"));
        let delay = u64::try_from(config.get_int("delay_ms", 0)).unwrap_or(0);
        for step in 1..=STEPS {
            if delay > 0 {
                tokio::select! {
                    () = ctx.cancellation().cancelled() => return Err(PluginError::Cancelled),
                    () = tokio::time::sleep(Duration::from_millis(delay)) => {}
                }
            }
            ctx.progress().update(&token, step, &format!("step {step}/{STEPS}"));
        }
        ctx.progress().complete(&token, "echoed");

        if hook_list(&request.config, "fail_on")
            .iter()
            .any(|name| name == hook.as_str())
        {
            ctx.logger().warning(format!("{hook} configured to fail"));
            return Ok(ExecuteResponse::failure(format!("{hook} configured to fail")));
        }

        let mut environment: Vec<&String> = context.environment.keys().collect();
        environment.sort();

        let mut response = ExecuteResponse::success(format!("{greeting} from {hook}"))
            .with_output("hook", hook.as_str())
            .with_output("version", context.version.clone())
            .with_output("previous_version", context.previous_version.clone())
            .with_output("tag_name", context.tag_name.clone())
            .with_output("repository", context.repository.full_name())
            .with_output("dry_run", request.dry_run)
            .with_output(
                "environment",
                Value::from(environment.into_iter().cloned().collect::<Vec<_>>()),
            );
        if let Some(changes) = &context.changes {
            response = response.with_output("changes", changes.len());
        }
        if !request.dry_run {
            response = response.with_artifact(Artifact::new(
                format!("echo-{hook}"),
                format!("echo/{hook}.json"),
                "json",
            ));
        }
        Ok(response)
    }

    async fn validate(
        &self,
        _ctx: &CallContext,
        config: &ConfigMap,
    ) -> PluginResult<ValidateResponse> {
        let mut builder = ValidateResponse::builder()
            .required(config, "greeting")
            .string(config, "greeting");

        for name in hook_list(config, "fail_on") {
            builder = builder.check(
                name.parse::<Hook>().is_ok(),
                "fail_on",
                format!("unknown hook: {name}"),
                "invalid_value",
            );
        }
        if let Some(delay) = config.get("delay_ms") {
            builder = builder.check(
                delay.as_u64().is_some(),
                "delay_ms",
                "delay_ms must be a non-negative integer",
                "invalid_type",
            );
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_plugin::ReleaseContext;
    use serde_json::json;

    fn config(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_info_declares_every_hook() {
        let info = EchoPlugin::new().get_info();
        assert_eq!(info.name, "echo");
        assert!(Hook::ALL.iter().all(|hook| info.supports(*hook)));
        assert!(info.config_schema.is_some());
    }

    #[tokio::test]
    async fn test_execute_echoes_context() {
        let request = ExecuteRequest::new(
            Hook::PostVersion,
            ReleaseContext::new("2.1.0")
                .with_previous_version("2.0.0")
                .with_tag_name("v2.1.0"),
        )
        .with_config(config(json!({"greeting": "hi"})));

        let response = EchoPlugin
            .execute(&CallContext::detached(), request)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.message, "hi from post-version");
        assert_eq!(response.outputs["version"], "2.1.0");
        assert_eq!(response.outputs["previous_version"], "2.0.0");
        assert_eq!(response.outputs["tag_name"], "v2.1.0");
        assert_eq!(response.artifacts.len(), 1);
        assert_eq!(response.artifacts[0].path, "echo/post-version.json");
    }

    #[tokio::test]
    async fn test_dry_run_skips_artifacts() {
        let request =
            ExecuteRequest::new(Hook::PrePublish, ReleaseContext::new("1.0.0")).dry_run(true);
        let response = EchoPlugin
            .execute(&CallContext::detached(), request)
            .await
            .unwrap();
        assert_eq!(response.outputs["dry_run"], true);
        assert!(response.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_fail_on_hook() {
        let request = ExecuteRequest::new(Hook::OnError, ReleaseContext::new("1.0.0"))
            .with_config(config(json!({"greeting": "hi", "fail_on": ["on-error"]})));
        let response = EchoPlugin
            .execute(&CallContext::detached(), request)
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("on-error configured to fail"));
    }

    #[tokio::test]
    async fn test_delay_observes_cancellation() {
        let ctx = CallContext::detached();
        ctx.cancellation().cancel();
        let request = ExecuteRequest::new(Hook::PreInit, ReleaseContext::new("1.0.0"))
            .with_config(config(json!({"delay_ms": 5_000})));
        let result = EchoPlugin.execute(&ctx, request).await;
        assert!(matches!(result, Err(PluginError::Cancelled)));
    }

    #[tokio::test]
    async fn test_validate() {
        let ctx = CallContext::detached();
        let ok = EchoPlugin
            .validate(&ctx, &config(json!({"greeting": "hi", "fail_on": ["post-publish"]})))
            .await
            .unwrap();
        assert!(ok.valid);

        let bad = EchoPlugin
            .validate(
                &ctx,
                &config(json!({"fail_on": ["post-party"], "delay_ms": -1})),
            )
            .await
            .unwrap();
        let fields: Vec<_> = bad.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["greeting", "fail_on", "delay_ms"]);
    }
}
