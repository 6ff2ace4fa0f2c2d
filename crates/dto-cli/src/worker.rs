//! Worker loop: dequeue a task id, acquire its exclusion lock, execute the
//! registered handler, and commit the outcome.

use std::time::Duration;

use chrono::Utc;
use dto_kernel::{ExclusionLock, Queue, RetryPolicy, TaskStatus};
use dto_handlers::HandlerRegistry;
use dto_store::{StoreResult, Task, TaskStore};
use dto_web::metrics::Metrics;
use tracing::{error, info, warn};

/// Wall-clock budget given to a single handler execution.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(15);

/// Claim, execute, and settle exactly one task id popped from the queue.
/// Returns `Ok(true)` if a task was claimed and processed (in any outcome),
/// `Ok(false)` if the poll timed out with nothing to do.
pub async fn run_once(
    store: &TaskStore,
    queue: &Queue,
    lock: &ExclusionLock,
    registry: &HandlerRegistry,
    retry_policy: &RetryPolicy,
    metrics: &Metrics,
    poll_timeout_seconds: f64,
    lock_ttl_seconds: u64,
) -> StoreResult<bool> {
    let Some(task_id) = queue.dequeue(poll_timeout_seconds).await.map_err(|e| {
        dto_store::StoreError::TaskJoin(format!("queue dequeue failed: {e}"))
    })?
    else {
        return Ok(false);
    };

    let Some(guard) = lock.try_acquire(&task_id, lock_ttl_seconds).await.map_err(|e| {
        dto_store::StoreError::TaskJoin(format!("lock acquire failed: {e}"))
    })?
    else {
        // Another worker already holds the lock for this id; the queue
        // entry we just popped is redundant and simply dropped.
        warn!(task_id = %task_id, "lock contended, skipping");
        return Ok(true);
    };

    let outcome = process_claimed_task(store, registry, retry_policy, metrics, &task_id).await;
    if let Err(e) = &outcome {
        error!(task_id = %task_id, error = %e, "failed to process claimed task");
        metrics.worker_exceptions_total.inc();
    }

    if let Err(e) = lock.release(guard).await {
        warn!(task_id = %task_id, error = %e, "failed to release lock");
    }

    outcome.map(|()| true)
}

async fn process_claimed_task(
    store: &TaskStore,
    registry: &HandlerRegistry,
    retry_policy: &RetryPolicy,
    metrics: &Metrics,
    task_id: &str,
) -> StoreResult<()> {
    let Some(task) = store.get(task_id).await? else {
        // Already deleted, or never existed; nothing to do.
        return Ok(());
    };

    // The task may have been canceled, already claimed by a faster worker,
    // or not yet due (a stale queue entry from a prior scheduler tick).
    if task.status != TaskStatus::Queued || task.next_run_at > Utc::now() {
        return Ok(());
    }

    let running = store
        .update_with_event(task_id, TaskStatus::Queued, TaskStatus::Running, "claimed by worker", |_| {})
        .await?;

    let handler_result = tokio::time::timeout(
        HANDLER_TIMEOUT,
        registry.dispatch(&running.task_type, running.payload.clone()),
    )
    .await;

    // Re-read the task: a concurrent cancel may have landed while the
    // handler was executing. Honoring it here means a canceled task never
    // gets overwritten back to COMPLETED/FAILED/QUEUED after the fact.
    let current = store.get(task_id).await?;
    if let Some(current) = &current {
        if current.status == TaskStatus::Canceled {
            info!(task_id, "discarding handler outcome, task was canceled mid-execution");
            return Ok(());
        }
    } else {
        return Ok(());
    }

    match handler_result {
        Ok(Ok(result)) => {
            store
                .update_with_event(task_id, TaskStatus::Running, TaskStatus::Completed, "handler succeeded", move |t| {
                    t.result = Some(result);
                    t.last_error = None;
                })
                .await?;
            metrics.tasks_completed_total.inc();
            info!(task_id, "task completed");
        }
        Ok(Err(e)) => settle_failure(store, retry_policy, metrics, task_id, &running, e.to_string()).await?,
        Err(_) => {
            settle_failure(store, retry_policy, metrics, task_id, &running, "handler execution timed out".to_string())
                .await?;
        }
    }

    Ok(())
}

async fn settle_failure(
    store: &TaskStore,
    retry_policy: &RetryPolicy,
    metrics: &Metrics,
    task_id: &str,
    running: &Task,
    error_message: String,
) -> StoreResult<()> {
    let next_attempts = running.attempts + 1;
    if next_attempts < running.max_attempts {
        let next_run_at = retry_policy.compute_next_run(next_attempts as u32);
        store
            .update_with_event(task_id, TaskStatus::Running, TaskStatus::Queued, "handler failed, retrying", move |t| {
                t.attempts = next_attempts;
                t.last_error = Some(error_message);
                t.next_run_at = next_run_at;
            })
            .await?;
        metrics.tasks_retried_total.inc();
        warn!(task_id, attempts = next_attempts, "task failed, scheduled for retry");
    } else {
        store
            .update_with_event(task_id, TaskStatus::Running, TaskStatus::Failed, "handler failed, attempts exhausted", move |t| {
                t.attempts = next_attempts;
                t.last_error = Some(error_message);
            })
            .await?;
        metrics.tasks_failed_total.inc();
        warn!(task_id, attempts = next_attempts, "task failed, attempts exhausted");
    }
    Ok(())
}

/// Run the worker loop forever, polling the queue and settling tasks.
pub async fn run(
    store: TaskStore,
    queue: Queue,
    lock: ExclusionLock,
    registry: HandlerRegistry,
    retry_policy: RetryPolicy,
    metrics: Metrics,
    poll_timeout_seconds: f64,
    lock_ttl_seconds: u64,
) -> ! {
    info!("worker loop starting");
    loop {
        match run_once(
            &store,
            &queue,
            &lock,
            &registry,
            &retry_policy,
            &metrics,
            poll_timeout_seconds,
            lock_ttl_seconds,
        )
        .await
        {
            Ok(_) => {}
            Err(e) => error!(error = %e, "worker iteration failed, continuing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dto_store::Database;

    async fn store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_and_migrate(dir.path().join("t.db")).await.unwrap();
        (dir, TaskStore::new(db))
    }

    #[tokio::test]
    async fn process_claimed_task_runs_cpu_burn_to_completion() {
        let (_dir, store) = store().await;
        let registry = dto_handlers::with_reference_handlers();
        let retry_policy = RetryPolicy::default();
        let metrics = Metrics::new();

        let task = store
            .insert_queued("cpu_burn", serde_json::json!({"milliseconds": 1}), None, 0, 5)
            .await
            .unwrap();

        process_claimed_task(&store, &registry, &retry_policy, &metrics, &task.id)
            .await
            .unwrap();

        let updated = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert!(updated.result.is_some());
        assert_eq!(metrics.tasks_completed_total.get(), 1);
    }

    #[tokio::test]
    async fn process_claimed_task_retries_on_unknown_task_type() {
        let (_dir, store) = store().await;
        let registry = dto_handlers::with_reference_handlers();
        let retry_policy = RetryPolicy::default();
        let metrics = Metrics::new();

        let task = store
            .insert_queued("no_such_handler", serde_json::json!({}), None, 0, 3)
            .await
            .unwrap();

        process_claimed_task(&store, &registry, &retry_policy, &metrics, &task.id)
            .await
            .unwrap();

        let updated = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Queued);
        assert_eq!(updated.attempts, 1);
        assert!(updated.last_error.is_some());
        assert!(updated.next_run_at > Utc::now());
        assert_eq!(metrics.tasks_retried_total.get(), 1);
    }

    #[tokio::test]
    async fn process_claimed_task_fails_terminally_after_exhausting_attempts() {
        let (_dir, store) = store().await;
        let registry = dto_handlers::with_reference_handlers();
        let retry_policy = RetryPolicy::default();
        let metrics = Metrics::new();

        let task = store
            .insert_queued("no_such_handler", serde_json::json!({}), None, 0, 1)
            .await
            .unwrap();

        process_claimed_task(&store, &registry, &retry_policy, &metrics, &task.id)
            .await
            .unwrap();

        let updated = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Failed);
        assert_eq!(updated.attempts, 1);
        assert_eq!(metrics.tasks_failed_total.get(), 1);
    }

    #[tokio::test]
    async fn process_claimed_task_skips_tasks_not_due_yet() {
        let (_dir, store) = store().await;
        let registry = dto_handlers::with_reference_handlers();
        let retry_policy = RetryPolicy::default();
        let metrics = Metrics::new();

        let task = store
            .insert_queued("cpu_burn", serde_json::json!({"milliseconds": 1}), None, 0, 5)
            .await
            .unwrap();
        store
            .update_with_event(&task.id, TaskStatus::Queued, TaskStatus::Queued, "rescheduled", |t| {
                t.next_run_at = Utc::now() + chrono::Duration::hours(1);
            })
            .await
            .unwrap();

        process_claimed_task(&store, &registry, &retry_policy, &metrics, &task.id)
            .await
            .unwrap();

        let unchanged = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::Queued);
        assert_eq!(unchanged.attempts, 0);
    }

    #[tokio::test]
    async fn canceled_mid_execution_is_not_overwritten() {
        let (_dir, store) = store().await;
        let registry = dto_handlers::with_reference_handlers();

        let task = store
            .insert_queued("cpu_burn", serde_json::json!({"milliseconds": 1}), None, 0, 5)
            .await
            .unwrap();
        let running = store
            .update_with_event(&task.id, TaskStatus::Queued, TaskStatus::Running, "claimed", |_| {})
            .await
            .unwrap();

        // Simulate a user cancel landing while the handler is "in flight".
        store
            .update_with_event(&task.id, TaskStatus::Running, TaskStatus::Canceled, "cancelled by user", |_| {})
            .await
            .unwrap();

        let result = registry.dispatch(&running.task_type, running.payload.clone()).await;
        assert!(result.is_ok());

        let current = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::Canceled);
        // The worker's post-execution re-read (exercised in process_claimed_task)
        // would see this and discard the handler outcome rather than overwrite it.
    }
}
