//! Drives the echo plugin binary as a real child process.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_plugin::{ConfigMap, ExecuteRequest, Hook, ProgressKind, ReleaseContext};
use cadence_rpc::{CallOptions, PluginProcess, RpcError, SupervisorConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const ECHO_BIN: &str = env!("CARGO_BIN_EXE_cadence-plugin-echo");

fn config(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

async fn spawn() -> PluginProcess {
    PluginProcess::spawn("echo", ECHO_BIN, &SupervisorConfig::default())
        .await
        .expect("echo plugin should start")
}

#[tokio::test]
async fn test_handshake_and_info() {
    let process = spawn().await;
    assert!(process.reattach().address.exists());
    assert!(process.id().is_some());

    let info = process.client().get_info().await;
    assert_eq!(info.name, "echo");
    assert_eq!(info.hooks, Hook::ALL.to_vec());

    let status = process.shutdown().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_execute_with_progress() {
    let process = spawn().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let request = ExecuteRequest::new(
        Hook::PostPublish,
        ReleaseContext::new("3.0.0").with_tag_name("v3.0.0"),
    )
    .with_config(config(json!({"greeting": "howdy"})));
    let options = CallOptions::new().with_progress(move |event| {
        sink.lock().unwrap().push((event.kind, event.percentage));
    });

    let response = process
        .client()
        .execute_with(&request, &options)
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.message, "howdy from post-publish");
    assert_eq!(response.outputs["tag_name"], "v3.0.0");
    assert_eq!(response.artifacts.len(), 1);

    let events = events.lock().unwrap().clone();
    assert_eq!(events.first().unwrap().0, ProgressKind::Begin);
    assert_eq!(events.last().unwrap(), &(ProgressKind::End, 100.0));
    assert_eq!(events.len(), 5);
    assert!(process.client().progress().is_empty());

    process.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_validate_through_process() {
    let process = spawn().await;

    let ok = process
        .client()
        .validate(&config(json!({"greeting": "hi"})))
        .await
        .unwrap();
    assert!(ok.valid);

    let bad = process.client().validate(&ConfigMap::new()).await.unwrap();
    assert!(!bad.valid);
    assert_eq!(bad.errors[0].field, "greeting");
    assert_eq!(bad.errors[0].code, "required");

    process.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_slow_call() {
    let process = spawn().await;
    let token = CancellationToken::new();

    let request = ExecuteRequest::new(Hook::PrePublish, ReleaseContext::new("1.0.0"))
        .with_config(config(json!({"greeting": "hi", "delay_ms": 10_000})));
    let options = CallOptions::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });
    let result = process.client().execute_with(&request, &options).await;
    canceller.await.unwrap();
    assert!(matches!(result, Err(RpcError::Cancelled)));

    // The connection stays usable after a cancelled call.
    let info = process.client().get_info().await;
    assert_eq!(info.name, "echo");

    process.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wrong_cookie_is_rejected() {
    let mut supervisor = SupervisorConfig::default().with_startup_timeout(Duration::from_secs(5));
    supervisor.handshake.magic_cookie_value = "not-the-cookie";

    let result = PluginProcess::spawn("echo", ECHO_BIN, &supervisor).await;
    assert!(result.is_err());
}
