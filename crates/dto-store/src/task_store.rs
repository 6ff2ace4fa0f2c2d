//! Task and task-event persistence.
//!
//! Row-struct plus fallible JSON conversion, `spawn_blocking`-dispatched
//! SQL, implementing the orchestrator's task lifecycle: lookup by id,
//! idempotency-keyed lookup, an atomic insert that records the
//! `created`/`enqueued` events in the same transaction, a generic
//! update-plus-event commit used by the worker and the cancel endpoint, the
//! due-task scan the scheduler polls, and cursor-paginated listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::cursor::Cursor;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use dto_kernel::TaskStatus;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A persisted task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub priority: i32,
    pub idempotency_key: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
}

/// An append-only audit record of a status change (or annotation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: i64,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    pub message: String,
}

const TASK_COLUMNS: &str = "id, task_type, payload_json, status, priority, idempotency_key, \
     attempts, max_attempts, created_at, updated_at, next_run_at, locked_until, last_error, result_json";

/// Raw row data from SQLite before JSON/timestamp deserialization: keeps
/// the `rusqlite` closure infallible on the JSON side, with conversion in a
/// second step where `StoreError::Json` can be returned.
struct TaskRow {
    id: String,
    task_type: String,
    payload_json: String,
    status: String,
    priority: i32,
    idempotency_key: Option<String>,
    attempts: i32,
    max_attempts: i32,
    created_at: String,
    updated_at: String,
    next_run_at: String,
    locked_until: Option<String>,
    last_error: Option<String>,
    result_json: Option<String>,
}

fn parse_rfc3339(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidArgument(format!("bad timestamp {s:?}: {e}")))
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(TaskRow {
            id: row.get(0)?,
            task_type: row.get(1)?,
            payload_json: row.get(2)?,
            status: row.get(3)?,
            priority: row.get(4)?,
            idempotency_key: row.get(5)?,
            attempts: row.get(6)?,
            max_attempts: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            next_run_at: row.get(10)?,
            locked_until: row.get(11)?,
            last_error: row.get(12)?,
            result_json: row.get(13)?,
        })
    }

    fn into_task(self) -> StoreResult<Task> {
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown status {:?}", self.status)))?;
        Ok(Task {
            id: self.id,
            task_type: self.task_type,
            payload: serde_json::from_str(&self.payload_json)?,
            status,
            priority: self.priority,
            idempotency_key: self.idempotency_key,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            created_at: parse_rfc3339(&self.created_at)?,
            updated_at: parse_rfc3339(&self.updated_at)?,
            next_run_at: parse_rfc3339(&self.next_run_at)?,
            locked_until: self.locked_until.as_deref().map(parse_rfc3339).transpose()?,
            last_error: self.last_error,
            result: self.result_json.map(|s| serde_json::from_str(&s)).transpose()?,
        })
    }
}

fn select_one(conn: &rusqlite::Connection, sql: &str, id: &str) -> StoreResult<Option<Task>> {
    let result = conn.query_row(sql, rusqlite::params![id], TaskRow::from_row);
    match result {
        Ok(row) => row.into_task().map(Some),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  TaskStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD and lifecycle operations on task records and their audit events.
#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a single task by id, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                select_one(
                    conn,
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    &id,
                )
            })
            .await
    }

    /// Look up a task by its `(task_type, idempotency_key)` pair.
    #[instrument(skip(self))]
    pub async fn find_by_idempotency_key(
        &self,
        task_type: &str,
        key: &str,
    ) -> StoreResult<Option<Task>> {
        let task_type = task_type.to_string();
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    &format!(
                        "SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = ?1 AND idempotency_key = ?2"
                    ),
                    rusqlite::params![task_type, key],
                    TaskRow::from_row,
                );
                match result {
                    Ok(row) => row.into_task().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Create a new task in `PENDING`, then atomically record the `"created"`
    /// self-transition event, move it to `QUEUED`, and record the
    /// `"enqueued"` event — all in a single transaction, per the submission
    /// service's step 3. Returns [`StoreError::DuplicateIdempotencyKey`] if
    /// `(task_type, idempotency_key)` already exists.
    #[instrument(skip(self, payload))]
    pub async fn insert_queued(
        &self,
        task_type: &str,
        payload: serde_json::Value,
        idempotency_key: Option<&str>,
        priority: i32,
        max_attempts: i32,
    ) -> StoreResult<Task> {
        let id = Uuid::new_v4().to_string();
        let task_type = task_type.to_string();
        let idempotency_key = idempotency_key.map(|s| s.to_string());
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let payload_json = serde_json::to_string(&payload)?;

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;

                let inserted = tx.execute(
                    "INSERT INTO tasks (id, task_type, payload_json, status, priority, idempotency_key, \
                         attempts, max_attempts, created_at, updated_at, next_run_at) \
                     VALUES (?1, ?2, ?3, 'PENDING', ?4, ?5, 0, ?6, ?7, ?7, ?7)",
                    rusqlite::params![id, task_type, payload_json, priority, idempotency_key, max_attempts, now_str],
                );

                if let Err(rusqlite::Error::SqliteFailure(e, _)) = &inserted {
                    if e.code == rusqlite::ErrorCode::ConstraintViolation {
                        return Err(StoreError::DuplicateIdempotencyKey {
                            task_type,
                            idempotency_key: idempotency_key.unwrap_or_default(),
                        });
                    }
                }
                inserted?;

                tx.execute(
                    "INSERT INTO task_events (task_id, timestamp, from_status, to_status, message) \
                     VALUES (?1, ?2, 'PENDING', 'PENDING', 'created')",
                    rusqlite::params![id, now_str],
                )?;

                tx.execute(
                    "UPDATE tasks SET status = 'QUEUED', updated_at = ?2 WHERE id = ?1",
                    rusqlite::params![id, now_str],
                )?;

                tx.execute(
                    "INSERT INTO task_events (task_id, timestamp, from_status, to_status, message) \
                     VALUES (?1, ?2, 'PENDING', 'QUEUED', 'enqueued')",
                    rusqlite::params![id, now_str],
                )?;

                tx.commit()?;
                Ok(())
            })
            .await?;

        debug!(task_id = %id, "task created and queued");
        self.get(&id)
            .await?
            .ok_or_else(|| StoreError::NotFound { entity: "task", id })
    }

    /// Apply `mutate` to the current record, persist it, and append a
    /// `(from, to)` event — all in a single transaction. Returns
    /// [`StoreError::NotFound`] if the task does not exist.
    #[instrument(skip(self, mutate))]
    pub async fn update_with_event<F>(
        &self,
        id: &str,
        from: TaskStatus,
        to: TaskStatus,
        message: &str,
        mutate: F,
    ) -> StoreResult<Task>
    where
        F: FnOnce(&mut Task) + Send + 'static,
    {
        let id = id.to_string();
        let message = message.to_string();

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;

                let mut task = {
                    let result = tx.query_row(
                        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                        rusqlite::params![id],
                        TaskRow::from_row,
                    );
                    match result {
                        Ok(row) => row.into_task()?,
                        Err(rusqlite::Error::QueryReturnedNoRows) => {
                            return Err(StoreError::NotFound { entity: "task", id });
                        }
                        Err(e) => return Err(StoreError::Sqlite(e)),
                    }
                };

                // The caller's `from` must match what is actually on the row,
                // not just be a legal predecessor of `to` in the abstract state
                // machine. Without this a stale write — e.g. a worker that read
                // RUNNING before a concurrent `cancel` already moved the row to
                // CANCELED — would silently resurrect a terminal task. Reject
                // and let the caller observe the real current status instead.
                if task.status != from {
                    return Err(StoreError::IllegalTransition { from: task.status, to });
                }

                // Same-state writes are audit annotations (e.g. the
                // PENDING->PENDING "created" event, or a reschedule that
                // leaves status untouched) and are always permitted; a real
                // status change must be in the allowed-transition set, or
                // the write is a fatal invariant violation and the
                // transaction is left uncommitted.
                if from != to && !dto_kernel::can_transition(from, to) {
                    return Err(StoreError::IllegalTransition { from, to });
                }

                mutate(&mut task);
                task.status = to;
                task.updated_at = Utc::now();

                let payload_json = serde_json::to_string(&task.payload)?;
                let result_json = task
                    .result
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                tx.execute(
                    "UPDATE tasks SET payload_json = ?2, status = ?3, priority = ?4, attempts = ?5, \
                         max_attempts = ?6, updated_at = ?7, next_run_at = ?8, locked_until = ?9, \
                         last_error = ?10, result_json = ?11 WHERE id = ?1",
                    rusqlite::params![
                        task.id,
                        payload_json,
                        task.status.as_str(),
                        task.priority,
                        task.attempts,
                        task.max_attempts,
                        task.updated_at.to_rfc3339(),
                        task.next_run_at.to_rfc3339(),
                        task.locked_until.map(|t| t.to_rfc3339()),
                        task.last_error,
                        result_json,
                    ],
                )?;

                tx.execute(
                    "INSERT INTO task_events (task_id, timestamp, from_status, to_status, message) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        task.id,
                        task.updated_at.to_rfc3339(),
                        from.as_str(),
                        to.as_str(),
                        message,
                    ],
                )?;

                tx.commit()?;
                Ok(task)
            })
            .await
    }

    /// Fetch up to `limit` tasks with `status = QUEUED` and
    /// `next_run_at <= now`, ordered by `next_run_at` ascending — the
    /// scheduler's due-task scan.
    #[instrument(skip(self))]
    pub async fn query_due(&self, limit: i64) -> StoreResult<Vec<(String, i32)>> {
        let now = Utc::now().to_rfc3339();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, priority FROM tasks WHERE status = 'QUEUED' AND next_run_at <= ?1 \
                     ORDER BY next_run_at ASC LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![now, limit], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// List tasks, optionally filtered by status, in
    /// `created_at DESC, id DESC` order, paginated by an opaque cursor.
    ///
    /// Returns the page and a `next_cursor`, which is `None` when the page
    /// is the last one.
    #[instrument(skip(self))]
    pub async fn list_paginated(
        &self,
        status: Option<TaskStatus>,
        limit: i64,
        cursor: Option<&str>,
    ) -> StoreResult<(Vec<Task>, Option<String>)> {
        let cursor = cursor.map(Cursor::decode).transpose()?;
        let limit = limit.clamp(1, 100);

        self.db
            .execute(move |conn| {
                // Fetch one extra row to know whether another page follows.
                let fetch_limit = limit + 1;

                let rows: Vec<TaskRow> = match (&status, &cursor) {
                    (Some(status), Some(cursor)) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1 \
                             AND (created_at < ?2 OR (created_at = ?2 AND id < ?3)) \
                             ORDER BY created_at DESC, id DESC LIMIT ?4"
                        ))?;
                        stmt.query_map(
                            rusqlite::params![
                                status.as_str(),
                                cursor.created_at.to_rfc3339(),
                                cursor.id,
                                fetch_limit
                            ],
                            TaskRow::from_row,
                        )?
                        .collect::<Result<Vec<_>, _>>()?
                    }
                    (Some(status), None) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1 \
                             ORDER BY created_at DESC, id DESC LIMIT ?2"
                        ))?;
                        stmt.query_map(rusqlite::params![status.as_str(), fetch_limit], TaskRow::from_row)?
                            .collect::<Result<Vec<_>, _>>()?
                    }
                    (None, Some(cursor)) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TASK_COLUMNS} FROM tasks \
                             WHERE (created_at < ?1 OR (created_at = ?1 AND id < ?2)) \
                             ORDER BY created_at DESC, id DESC LIMIT ?3"
                        ))?;
                        stmt.query_map(
                            rusqlite::params![cursor.created_at.to_rfc3339(), cursor.id, fetch_limit],
                            TaskRow::from_row,
                        )?
                        .collect::<Result<Vec<_>, _>>()?
                    }
                    (None, None) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC LIMIT ?1"
                        ))?;
                        stmt.query_map(rusqlite::params![fetch_limit], TaskRow::from_row)?
                            .collect::<Result<Vec<_>, _>>()?
                    }
                };

                let mut tasks = rows
                    .into_iter()
                    .map(|r| r.into_task())
                    .collect::<StoreResult<Vec<_>>>()?;

                let next_cursor = if tasks.len() as i64 > limit {
                    tasks.truncate(limit as usize);
                    tasks
                        .last()
                        .map(|t| Cursor::encode(t.created_at, &t.id))
                } else {
                    None
                };

                Ok((tasks, next_cursor))
            })
            .await
    }
}
