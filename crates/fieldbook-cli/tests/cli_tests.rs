//! Integration tests for the `fieldbook` binary.
//!
//! These run the compiled binary and check the JSON it prints.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;

const BINARY: &str = env!("CARGO_BIN_EXE_fieldbook");

/// Run the binary with an isolated config directory and parse its stdout.
async fn run(args: &[&str]) -> Result<Value, String> {
    let home = tempfile::TempDir::new().map_err(|e| e.to_string())?;
    let child = tokio::process::Command::new(BINARY)
        .args(args)
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("FIELDBOOK_PLATFORM")
        .env_remove("FIELDBOOK_EMULATOR")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn fieldbook: {e}"))?;

    let output = tokio::time::timeout(Duration::from_secs(20), child.wait_with_output())
        .await
        .map_err(|_| "fieldbook did not exit in time".to_string())?
        .map_err(|e| e.to_string())?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).into_owned());
    }
    serde_json::from_slice(&output.stdout).map_err(|e| format!("stdout is not JSON: {e}"))
}

async fn start_backend() -> u16 {
    let app = Router::new()
        .route("/api/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/api/fields",
            get(|| async { Json(json!([{"id": 11, "name": "Court A"}])) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

#[tokio::test]
async fn test_candidates_for_android_emulator() {
    let output = run(&[
        "candidates",
        "--platform",
        "android",
        "--emulator",
        "--lan-host",
        "192.168.1.50",
    ])
    .await
    .unwrap();

    let hosts: Vec<String> = output["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| format!("{}:{}", c["host"].as_str().unwrap(), c["port"]))
        .collect();
    assert_eq!(
        hosts,
        vec!["10.0.2.2:5000", "192.168.1.50:5000", "localhost:5000"]
    );
}

#[tokio::test]
async fn test_offline_request_prints_substitute() {
    let output = run(&["request", "GET", "/api/reservations/my", "--offline"])
        .await
        .unwrap();
    assert_eq!(output["source"], "offline");
    assert!(!output["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_write_fails() {
    let result = run(&[
        "request",
        "POST",
        "/api/reservations",
        "--body",
        r#"{"field": 1}"#,
        "--offline",
    ])
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_auth_required_without_token() {
    let err = run(&["request", "GET", "/api/reservations/my", "--auth", "--offline"])
        .await
        .unwrap_err();
    assert!(err.contains("Authentication required"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_and_request_against_live_backend() {
    let port = start_backend().await;
    let host = format!("127.0.0.1:{port}");

    let status = run(&["resolve", "--platform", "web", "--override-host", &host])
        .await
        .unwrap();
    assert_eq!(status["phase"], "resolved");
    assert_eq!(status["endpoint"]["candidate"]["port"], port);

    let output = run(&[
        "request",
        "GET",
        "/api/fields",
        "--platform",
        "web",
        "--override-host",
        &host,
    ])
    .await
    .unwrap();
    assert_eq!(output, json!({"source": "live", "data": [{"id": 11, "name": "Court A"}]}));
}

#[tokio::test]
async fn test_dataset_listing() {
    let output = run(&["dataset"]).await.unwrap();
    assert!(output["version"].as_u64().unwrap() > 0);
    let keys: Vec<&str> = output["resources"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(keys.contains(&"fields.all"));
    assert!(keys.contains(&"reservations.mine"));
}
