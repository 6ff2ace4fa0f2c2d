//! End-to-end tests for the task orchestrator HTTP API.
//!
//! Spins up the real Axum router on an OS-assigned ephemeral port, with an
//! on-disk `tempfile` SQLite database, and drives it with real `reqwest`
//! requests — covering auth, validation, the submission/lookup/cancel
//! lifecycle, pagination, and the two operational endpoints.
//!
//! The queue handle here points at a throwaway Redis URL that is never
//! dialed in these tests (submission still writes and returns the task; a
//! failed `enqueue` is logged and left for the scheduler to recover), so
//! no live Redis is required to exercise the HTTP surface end-to-end.

use std::net::SocketAddr;

use dto_web::{AppState, WebConfig};
use serde_json::json;
use tokio::net::TcpListener;

const API_KEY: &str = "test-key";

async fn start_test_server() -> (String, tempfile::TempDir, tokio::task::JoinHandle<()>) {
    let dir = tempfile::tempdir().unwrap();
    let db = dto_store::Database::open_and_migrate(dir.path().join("t.db"))
        .await
        .unwrap();
    let queue = dto_kernel::Queue::new("redis://127.0.0.1:6399/0", "dto:test:queue").unwrap();
    let config = WebConfig {
        api_key: API_KEY.to_string(),
        ..WebConfig::default()
    };
    let state = std::sync::Arc::new(AppState::new(db, queue, config));
    let router = dto_web::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    (base, dir, handle)
}

#[test]
fn web_config_defaults() {
    let config = WebConfig::default();
    assert_eq!(config.bind_addr, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.max_request_bytes, 1_048_576);
    assert_eq!(config.default_max_attempts, 5);
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let (base, _dir, _srv) = start_test_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{base}/v1/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, _dir, _srv) = start_test_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{base}/v1/health"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn metrics_is_prometheus_text() {
    let (base, _dir, _srv) = start_test_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{base}/v1/metrics"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("tasks_created_total"));
}

#[tokio::test]
async fn submit_get_list_cancel_lifecycle() {
    let (base, _dir, _srv) = start_test_server().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{base}/v1/tasks"))
        .header("x-api-key", API_KEY)
        .json(&json!({"task_type": "cpu_burn", "payload": {"milliseconds": 5}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["status"], "QUEUED");
    let id = created["id"].as_str().unwrap().to_string();

    let fetched: serde_json::Value = client
        .get(format!("{base}/v1/tasks/{id}"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], id);

    let listed: serde_json::Value = client
        .get(format!("{base}/v1/tasks?status=QUEUED"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed["items"].as_array().unwrap().iter().any(|t| t["id"] == id));

    let cancel_resp = client
        .post(format!("{base}/v1/tasks/{id}/cancel"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(cancel_resp.status(), 200);
    let cancelled: serde_json::Value = cancel_resp.json().await.unwrap();
    assert_eq!(cancelled["status"], "CANCELED");

    // S6: cancelling an already-terminal task is a 409.
    let second_cancel = client
        .post(format!("{base}/v1/tasks/{id}/cancel"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(second_cancel.status(), 409);
}

#[tokio::test]
async fn get_unknown_task_is_404() {
    let (base, _dir, _srv) = start_test_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{base}/v1/tasks/does-not-exist"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn oversize_request_is_413() {
    let dir = tempfile::tempdir().unwrap();
    let db = dto_store::Database::open_and_migrate(dir.path().join("t.db"))
        .await
        .unwrap();
    let queue = dto_kernel::Queue::new("redis://127.0.0.1:6399/0", "dto:test:queue").unwrap();
    let config = WebConfig {
        api_key: API_KEY.to_string(),
        max_request_bytes: 10,
        ..WebConfig::default()
    };
    let state = std::sync::Arc::new(AppState::new(db, queue, config));
    let router = dto_web::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/tasks"))
        .header("x-api-key", API_KEY)
        .json(&json!({"task_type": "cpu_burn", "payload": {"lots": "of data here to exceed ten bytes"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
}
