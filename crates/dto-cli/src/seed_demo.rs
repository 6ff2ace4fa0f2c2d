//! `dto seed-demo`: post the three reference-handler example payloads to a
//! running API server, printing each response.

use serde_json::json;
use tracing::info;

/// Submit the demo payloads to `base_url` using `api_key`, printing the
/// HTTP status and response body for each.
pub async fn run(base_url: &str, api_key: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    let payloads = vec![
        json!({
            "task_type": "cpu_burn",
            "payload": {"milliseconds": 120},
            "idempotency_key": "demo-1",
        }),
        json!({
            "task_type": "data_transform",
            "payload": {
                "data": {"a": 1, "b": 2},
                "select": ["b"],
                "rename": {"b": "beta"},
            },
        }),
        json!({
            "task_type": "http_fetch",
            "payload": {
                "url": "https://example.com",
                "timeout_seconds": 5,
            },
        }),
    ];

    let url = format!("{}/v1/tasks", base_url.trim_end_matches('/'));
    for body in payloads {
        info!(%url, task_type = %body["task_type"], "submitting demo task");
        let response = client
            .post(&url)
            .header("X-Api-Key", api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        match response.json::<serde_json::Value>().await {
            Ok(parsed) => println!("{status} {parsed}"),
            Err(_) => println!("{status} <non-json response>"),
        }
    }

    Ok(())
}
