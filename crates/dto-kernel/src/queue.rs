//! Redis-backed work queue.
//!
//! Tasks ready to run are pushed onto a single Redis list (`LPUSH`) and
//! workers pop from the tail with a blocking read (`BRPOP`), giving FIFO
//! ordering across however many worker processes are polling. The payload is
//! a small JSON envelope rather than a bare task id so a future priority lane
//! split doesn't require a wire format change.

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Envelope pushed onto the queue list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEnvelope {
    pub task_id: String,
    /// Carried for observability; the queue itself is a single FIFO lane.
    pub priority: i32,
}

/// Redis-backed FIFO queue of ready-to-run task ids.
pub struct Queue {
    client: redis::Client,
    list_key: String,
}

impl Queue {
    /// Connect to `redis_url` and bind to the named list.
    pub fn new(redis_url: &str, list_key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            list_key: list_key.into(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Push a task id onto the head of the queue.
    pub async fn enqueue(&self, task_id: &str, priority: i32) -> Result<()> {
        let envelope = QueueEnvelope {
            task_id: task_id.to_string(),
            priority,
        };
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| KernelError::QueuePublishFailed { reason: e.to_string() })?;

        let mut conn = self.connection().await?;
        redis::cmd("LPUSH")
            .arg(&self.list_key)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KernelError::QueuePublishFailed { reason: e.to_string() })?;
        Ok(())
    }

    /// Block up to `timeout_seconds` waiting for a task id, returning `None`
    /// on timeout. A `timeout_seconds` of `0` blocks indefinitely.
    pub async fn dequeue(&self, timeout_seconds: f64) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.list_key)
            .arg(timeout_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| KernelError::QueueDequeueFailed { reason: e.to_string() })?;

        match reply {
            None => Ok(None),
            Some((_list, payload)) => {
                let envelope: QueueEnvelope = serde_json::from_str(&payload)
                    .map_err(|e| KernelError::QueueDequeueFailed { reason: e.to_string() })?;
                Ok(Some(envelope.task_id))
            }
        }
    }

    /// Current length of the queue list. Used by the `/v1/health` endpoint.
    pub async fn len(&self) -> Result<i64> {
        let mut conn = self.connection().await?;
        let len: i64 = redis::cmd("LLEN")
            .arg(&self.list_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| KernelError::QueueDequeueFailed { reason: e.to_string() })?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = QueueEnvelope {
            task_id: "11111111-1111-1111-1111-111111111111".to_string(),
            priority: 5,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: QueueEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id, envelope.task_id);
        assert_eq!(back.priority, envelope.priority);
    }

    // Exercising enqueue/dequeue against a live Redis instance belongs in
    // crate-level integration tests gated behind a reachable REDIS_URL.
}
