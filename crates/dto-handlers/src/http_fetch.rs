//! `http_fetch`: fetches a URL and reports status code and latency.
//!
//! Payload: `{"url": string, "timeout_seconds"?: number}`. Only `http`/`https`
//! schemes are allowed; IP-literal or named loopback/private/link-local/
//! `.local` hosts are rejected (SSRF guard) without attempting DNS
//! resolution. `timeout_seconds` is clamped to `[0.5, 10.0]`. Result:
//! `{"status_code": int, "latency_ms": int}`.

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::error::{HandlerError, Result};
use crate::registry::TaskHandler;

const MIN_TIMEOUT_SECONDS: f64 = 0.5;
const MAX_TIMEOUT_SECONDS: f64 = 10.0;
const DEFAULT_TIMEOUT_SECONDS: f64 = 5.0;

pub struct HttpFetchHandler {
    client: reqwest::Client,
}

impl HttpFetchHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetchHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject IP literals that are loopback/private/link-local, and named hosts
/// that are `localhost` or end in `.local`. Mirrors the reference
/// implementation's refusal to resolve DNS before judging a host.
fn is_private_host(host: &str) -> bool {
    if let Ok(ip) = IpAddr::from_str(host) {
        return match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_loopback() || is_unique_local_v6(&v6) || is_unicast_link_local_v6(&v6),
        };
    }
    let lowered = host.to_ascii_lowercase();
    lowered == "localhost" || lowered.ends_with(".local")
}

fn is_unique_local_v6(v6: &std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

fn is_unicast_link_local_v6(v6: &std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

#[async_trait]
impl TaskHandler for HttpFetchHandler {
    async fn execute(&self, payload: Value) -> Result<Value> {
        let url_str = payload
            .get("url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HandlerError::InvalidPayload("payload.url is required".into()))?;

        let parsed =
            Url::parse(url_str).map_err(|_| HandlerError::InvalidPayload("payload.url is not a valid URL".into()))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(HandlerError::InvalidPayload("only http/https URLs are allowed".into()));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| HandlerError::InvalidPayload("URL hostname missing".into()))?;
        if is_private_host(host) {
            return Err(HandlerError::InvalidPayload(
                "private/localhost targets are blocked".into(),
            ));
        }

        let timeout_seconds = payload
            .get("timeout_seconds")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
            .clamp(MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS);

        let start = std::time::Instant::now();
        let response = self
            .client
            .get(parsed)
            .timeout(Duration::from_secs_f64(timeout_seconds))
            .send()
            .await?;
        let latency_ms = start.elapsed().as_millis() as i64;

        Ok(json!({"status_code": response.status().as_u16(), "latency_ms": latency_ms}))
    }
}
