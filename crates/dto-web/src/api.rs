//! REST route handlers for the task orchestrator API.
//!
//! Implements the submission service directly against
//! [`AppState`]: validate, deduplicate on `(task_type, idempotency_key)`,
//! persist, enqueue, count. The remaining routes are thin reads over
//! [`dto_store::TaskStore`] plus the cancel transition and the two
//! operational endpoints (`health`, `metrics`).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use dto_kernel::{can_transition, TaskStatus};
use dto_store::{StoreError, Task};

use crate::error::ApiError;
use crate::state::AppState;

const MIN_PRIORITY: i32 = -100;
const MAX_PRIORITY: i32 = 100;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

// ═══════════════════════════════════════════════════════════════════════
//  Wire shapes
// ═══════════════════════════════════════════════════════════════════════

/// The task record wire shape, notably narrower than the stored [`Task`]:
/// `payload` and `locked_until` are internal only.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: String,
    pub task_type: String,
    pub status: &'static str,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub next_run_at: chrono::DateTime<chrono::Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub priority: i32,
    pub last_error: Option<String>,
    pub result: Option<Value>,
    pub idempotency_key: Option<String>,
}

impl From<Task> for TaskView {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            task_type: t.task_type,
            status: t.status.as_str(),
            created_at: t.created_at,
            updated_at: t.updated_at,
            next_run_at: t.next_run_at,
            attempts: t.attempts,
            max_attempts: t.max_attempts,
            priority: t.priority,
            last_error: t.last_error,
            result: t.result,
            idempotency_key: t.idempotency_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: String,
    pub payload: Value,
    pub idempotency_key: Option<String>,
    pub priority: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<TaskView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub redis: bool,
}

// ═══════════════════════════════════════════════════════════════════════
//  POST /v1/tasks
// ═══════════════════════════════════════════════════════════════════════

/// Submission service: validate, deduplicate, persist, enqueue, count.
#[instrument(skip(state, body), fields(task_type = %body.task_type))]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<TaskView>, ApiError> {
    if body.task_type.trim().is_empty() {
        return Err(ApiError::Validation("task_type must not be empty".into()));
    }
    if !body.payload.is_object() {
        return Err(ApiError::Validation("payload must be a JSON object".into()));
    }
    if let Some(key) = &body.idempotency_key {
        if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(ApiError::Validation(format!(
                "idempotency_key must be 1..{MAX_IDEMPOTENCY_KEY_LEN} characters"
            )));
        }
    }
    let priority = body.priority.unwrap_or(0);
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(ApiError::Validation(format!(
            "priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}"
        )));
    }

    // Step 1: idempotency short-circuit.
    if let Some(key) = &body.idempotency_key {
        if let Some(existing) = state.tasks.find_by_idempotency_key(&body.task_type, key).await? {
            return Ok(Json(existing.into()));
        }
    }

    // Steps 2-3: insert PENDING->QUEUED in one transaction. A uniqueness
    // race with another in-flight create for the same key is resolved by
    // re-reading the winner rather than surfacing the constraint error.
    let task = match state
        .tasks
        .insert_queued(
            &body.task_type,
            body.payload,
            body.idempotency_key.as_deref(),
            priority,
            state.config.default_max_attempts,
        )
        .await
    {
        Ok(task) => task,
        Err(StoreError::DuplicateIdempotencyKey { task_type, idempotency_key }) => {
            state
                .tasks
                .find_by_idempotency_key(&task_type, &idempotency_key)
                .await?
                .ok_or(ApiError::NotFound)?
        }
        Err(e) => return Err(e.into()),
    };

    // Step 4: publish onto the queue. A failure here leaves the task
    // QUEUED in the store; the scheduler's due-task scan recovers it.
    if let Err(e) = state.queue.enqueue(&task.id, task.priority).await {
        warn!(task_id = %task.id, error = %e, "queue publish failed, relying on scheduler to recover");
    }

    // Step 5.
    state.metrics.tasks_created_total.inc();

    info!(task_id = %task.id, task_type = %task.task_type, "task submitted");
    Ok(Json(task.into()))
}

// ═══════════════════════════════════════════════════════════════════════
//  GET /v1/tasks/{id}
// ═══════════════════════════════════════════════════════════════════════

#[instrument(skip(state))]
pub async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<TaskView>, ApiError> {
    let task = state.tasks.get(&id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(task.into()))
}

// ═══════════════════════════════════════════════════════════════════════
//  GET /v1/tasks
// ═══════════════════════════════════════════════════════════════════════

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| TaskStatus::parse(s).ok_or_else(|| ApiError::Validation(format!("unknown status: {s}"))))
        .transpose()?;

    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let (items, next_cursor) = state
        .tasks
        .list_paginated(status, limit, query.cursor.as_deref())
        .await?;

    Ok(Json(ListResponse {
        items: items.into_iter().map(TaskView::from).collect(),
        next_cursor,
    }))
}

// ═══════════════════════════════════════════════════════════════════════
//  POST /v1/tasks/{id}/cancel
// ═══════════════════════════════════════════════════════════════════════

#[instrument(skip(state))]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let task = state.tasks.get(&id).await?.ok_or(ApiError::NotFound)?;

    if task.status.is_terminal() || !can_transition(task.status, TaskStatus::Canceled) {
        return Err(ApiError::Conflict("task is already terminal"));
    }

    let cancelled = state
        .tasks
        .update_with_event(&id, task.status, TaskStatus::Canceled, "cancelled by user", |_| {})
        .await?;
    state.metrics.tasks_canceled_total.inc();

    info!(task_id = %cancelled.id, "task cancelled");
    Ok(Json(CancelResponse {
        id: cancelled.id,
        status: "CANCELED",
    }))
}

// ═══════════════════════════════════════════════════════════════════════
//  GET /v1/health
// ═══════════════════════════════════════════════════════════════════════

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let redis_ok = state.queue.len().await.is_ok();
    Json(HealthResponse { ok: true, redis: redis_ok })
}

// ═══════════════════════════════════════════════════════════════════════
//  GET /v1/metrics
// ═══════════════════════════════════════════════════════════════════════

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
