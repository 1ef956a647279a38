//! End-to-end calls against an in-process plugin server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_commit::{CategorizedChanges, ConventionalCommit};
use cadence_plugin::{
    Artifact, CallContext, ConfigAccessor, ConfigMap, ExecuteRequest, ExecuteResponse, Hook,
    Info, LogLevel, LogNotification, Plugin, PluginError, PluginResult, ProgressKind,
    ProgressNotification, ReleaseContext, ValidateResponse,
};
use cadence_rpc::{CallOptions, ClientOptions, PluginClient, RpcError, TestServer, serve_test};
use serde_json::json;
use tokio_util::sync::CancellationToken;

struct Recorder {
    cancelled: Arc<AtomicBool>,
}

#[async_trait]
impl Plugin for Recorder {
    fn get_info(&self) -> Info {
        Info::new("recorder", "1.0.0")
            .with_description("records what it is asked to do")
            .with_hooks([Hook::PreVersion, Hook::PostPublish, Hook::OnError])
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        request: ExecuteRequest,
    ) -> PluginResult<ExecuteResponse> {
        match request.hook {
            Hook::PostPublish => {
                ctx.logger()
                    .info(format!("publishing {}", request.context.version));
                let token = ctx.progress().start(4, "uploading");
                for step in 1..=4 {
                    ctx.progress().update(&token, step, "uploading");
                }
                ctx.progress().complete(&token, "uploaded");

                let config = ConfigAccessor::new(&request.config);
                let changes = request.context.changes.as_ref().map_or(0, CategorizedChanges::len);
                Ok(ExecuteResponse::success("published")
                    .with_output("channel", config.get_string("channel", "none"))
                    .with_output("version", request.context.version.clone())
                    .with_output("changes", changes)
                    .with_output("dry_run", request.dry_run)
                    .with_artifact(Artifact::new("one", "dist/one", "archive"))
                    .with_artifact(Artifact::new("two", "dist/two", "archive")))
            }
            Hook::PreVersion => {
                tokio::select! {
                    () = ctx.cancellation().cancelled() => {
                        self.cancelled.store(true, Ordering::SeqCst);
                        Err(PluginError::Cancelled)
                    }
                    () = tokio::time::sleep(Duration::from_secs(30)) => {
                        Ok(ExecuteResponse::success("slept"))
                    }
                }
            }
            Hook::OnError => Err(PluginError::ExecutionFailed("cannot recover".to_string())),
            other => Ok(ExecuteResponse::failure(format!("{other} is not supported"))),
        }
    }

    async fn validate(
        &self,
        _ctx: &CallContext,
        config: &ConfigMap,
    ) -> PluginResult<ValidateResponse> {
        Ok(ValidateResponse::builder()
            .required(config, "greeting")
            .string(config, "greeting")
            .build())
    }
}

async fn start() -> (TestServer, PluginClient, Arc<AtomicBool>) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let server = serve_test(Recorder {
        cancelled: cancelled.clone(),
    })
    .await
    .unwrap();
    let client = PluginClient::connect(
        server.reattach(),
        ClientOptions::default().with_name("recorder"),
    )
    .await
    .unwrap();
    (server, client, cancelled)
}

fn config(value: serde_json::Value) -> ConfigMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

#[tokio::test]
async fn test_get_info() {
    let (server, client, _) = start().await;

    let info = client.get_info().await;
    assert_eq!(info.name, "recorder");
    assert_eq!(info.description, "records what it is asked to do");
    assert_eq!(
        info.hooks,
        vec![Hook::PreVersion, Hook::PostPublish, Hook::OnError]
    );

    server.close().await;
}

#[tokio::test]
async fn test_execute_round_trips_context_and_outputs() {
    let (server, client, _) = start().await;

    let commit = ConventionalCommit::builder("abc", "feat")
        .description("add feature")
        .build();
    let context = ReleaseContext::new("2.1.0")
        .with_changes(CategorizedChanges::from_commits([commit]));
    let request = ExecuteRequest::new(Hook::PostPublish, context)
        .with_config(config(json!({"channel": "#releases"})))
        .dry_run(true);

    let response = client.execute(&request).await.unwrap();
    assert!(response.success);
    assert_eq!(response.message, "published");
    assert_eq!(response.outputs["channel"], "#releases");
    assert_eq!(response.outputs["version"], "2.1.0");
    assert_eq!(response.outputs["changes"], 1);
    assert_eq!(response.outputs["dry_run"], true);
    let names: Vec<_> = response.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["one", "two"]);

    server.close().await;
}

#[tokio::test]
async fn test_progress_arrives_before_response() {
    let (server, client, _) = start().await;

    let events: Arc<Mutex<Vec<ProgressNotification>>> = Arc::default();
    let sink = events.clone();
    let options = CallOptions::new().with_progress(move |event: &ProgressNotification| {
        sink.lock().unwrap().push(event.clone());
    });

    let request = ExecuteRequest::new(Hook::PostPublish, ReleaseContext::new("1.0.0"));
    let response = client.execute_with(&request, &options).await.unwrap();
    assert!(response.success);

    let events = events.lock().unwrap();
    let summary: Vec<_> = events.iter().map(|e| (e.kind, e.percentage)).collect();
    assert_eq!(
        summary,
        vec![
            (ProgressKind::Begin, 0.0),
            (ProgressKind::Report, 25.0),
            (ProgressKind::Report, 50.0),
            (ProgressKind::Report, 75.0),
            (ProgressKind::Report, 100.0),
            (ProgressKind::End, 100.0),
        ]
    );
    assert!(client.progress().is_empty());

    server.close().await;
}

#[tokio::test]
async fn test_log_lines_reach_handler() {
    let (server, client, _) = start().await;

    let logs: Arc<Mutex<Vec<LogNotification>>> = Arc::default();
    let sink = logs.clone();
    client.set_log_handler(Arc::new(move |log: &LogNotification| {
        sink.lock().unwrap().push(log.clone());
    }));

    let request = ExecuteRequest::new(Hook::PostPublish, ReleaseContext::new("3.0.0"));
    client.execute(&request).await.unwrap();

    let logs = logs.lock().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Info);
    assert_eq!(logs[0].message, "publishing 3.0.0");
    assert_eq!(logs[0].logger, "recorder");

    server.close().await;
}

#[tokio::test]
async fn test_concurrent_calls_keep_progress_apart() {
    let (server, client, _) = start().await;
    let client = Arc::new(client);

    let calls: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let seen: Arc<Mutex<Vec<ProgressNotification>>> = Arc::default();
                let sink = seen.clone();
                let options = CallOptions::new().with_progress(move |event: &ProgressNotification| {
                    sink.lock().unwrap().push(event.clone());
                });
                let request =
                    ExecuteRequest::new(Hook::PostPublish, ReleaseContext::new(format!("1.0.{i}")));
                let response = client.execute_with(&request, &options).await.unwrap();
                assert_eq!(response.outputs["version"], format!("1.0.{i}"));
                let seen = seen.lock().unwrap().clone();
                seen
            })
        })
        .collect();

    for call in calls {
        let seen = call.await.unwrap();
        assert_eq!(seen.len(), 6);
        let token = &seen[0].progress_token;
        assert!(seen.iter().all(|e| &e.progress_token == token));
    }

    server.close().await;
}

#[tokio::test]
async fn test_cancellation_reaches_plugin() {
    let (server, client, cancelled) = start().await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let request = ExecuteRequest::new(Hook::PreVersion, ReleaseContext::new("1.0.0"));
    let result = client
        .execute_with(&request, &CallOptions::new().with_cancellation(token))
        .await;
    assert!(matches!(result, Err(RpcError::Cancelled)));

    let mut observed = false;
    for _ in 0..100 {
        if cancelled.load(Ordering::SeqCst) {
            observed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(observed, "plugin never saw the cancellation");

    server.close().await;
}

#[tokio::test]
async fn test_plugin_error_is_remote_error() {
    let (server, client, _) = start().await;

    let request = ExecuteRequest::new(Hook::OnError, ReleaseContext::new("1.0.0"));
    match client.execute(&request).await {
        Err(RpcError::Remote { code, message }) => {
            assert_eq!(code, -32603);
            assert!(message.contains("cannot recover"));
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    server.close().await;
}

#[tokio::test]
async fn test_domain_failure_is_a_response() {
    let (server, client, _) = start().await;

    let request = ExecuteRequest::new(Hook::PreInit, ReleaseContext::new("1.0.0"));
    let response = client.execute(&request).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("pre-init is not supported"));

    server.close().await;
}

#[tokio::test]
async fn test_validate() {
    let (server, client, _) = start().await;

    let ok = client
        .validate(&config(json!({"greeting": "hello"})))
        .await
        .unwrap();
    assert!(ok.valid);

    let missing = client.validate(&ConfigMap::new()).await.unwrap();
    assert!(!missing.valid);
    assert_eq!(missing.errors[0].field, "greeting");
    assert_eq!(missing.errors[0].code, "required");

    let wrong_type = client
        .validate(&config(json!({"greeting": 5})))
        .await
        .unwrap();
    assert_eq!(wrong_type.errors.len(), 1);
    assert_eq!(wrong_type.errors[0].code, "invalid_type");

    server.close().await;
}

#[tokio::test]
async fn test_validate_unparseable_config() {
    let (server, client, _) = start().await;

    let response = client
        .validate_raw("{\"greeting\": ".to_string(), &CallOptions::new())
        .await
        .unwrap();
    assert!(!response.valid);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].field, "config");
    assert_eq!(response.errors[0].code, "parse_error");

    server.close().await;
}

#[tokio::test]
async fn test_calls_fail_after_server_closes() {
    let (server, client, _) = start().await;
    server.close().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let result = client.validate(&ConfigMap::new()).await;
    assert!(matches!(result, Err(RpcError::ConnectionClosed)));
    assert!(client.get_info().await.is_empty());
}
