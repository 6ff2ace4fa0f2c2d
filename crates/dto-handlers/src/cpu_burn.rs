//! `cpu_burn`: busy-loops a cheap checksum for a clamped duration.
//!
//! Payload: `{"milliseconds": int}`, clamped to `[1, 500]`.
//! Result: `{"burned_ms": int, "checksum": int}`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{HandlerError, Result};
use crate::registry::TaskHandler;

const MIN_MS: u64 = 1;
const MAX_MS: u64 = 500;

pub struct CpuBurnHandler;

#[async_trait]
impl TaskHandler for CpuBurnHandler {
    async fn execute(&self, payload: Value) -> Result<Value> {
        let ms = payload
            .get("milliseconds")
            .and_then(Value::as_i64)
            .ok_or_else(|| HandlerError::InvalidPayload("payload.milliseconds must be an integer".into()))?;
        let ms = ms.clamp(MIN_MS as i64, MAX_MS as i64) as u64;

        // Runs on a blocking-friendly executor slot; the busy loop itself is
        // synchronous CPU work, not an await point.
        let (burned_ms, checksum) = tokio::task::spawn_blocking(move || burn(ms))
            .await
            .map_err(|e| HandlerError::Execution(e.to_string()))?;

        Ok(json!({"burned_ms": burned_ms, "checksum": checksum}))
    }
}

fn burn(ms: u64) -> (u64, u64) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(ms);
    let mut x: u64 = 0;
    while std::time::Instant::now() < deadline {
        x = (x * 31 + 7) % 1_000_000_007;
    }
    (ms, x)
}
