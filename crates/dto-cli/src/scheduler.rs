//! Scheduler loop: periodically republish due `QUEUED` tasks onto the
//! queue, recovering from lost queue entries and delivering retries whose
//! `next_run_at` has come due.

use std::time::Duration;

use dto_kernel::Queue;
use dto_store::TaskStore;
use tracing::{debug, info, warn};

/// Maximum number of due tasks fetched per scan.
const DUE_SCAN_LIMIT: i64 = 200;

/// Run one scan-and-republish cycle; returns the number of ids published.
/// A publish failure for one id is logged and does not abort the scan —
/// the scheduler's next cycle (or another worker's claim) will retry it.
pub async fn scan_and_publish(store: &TaskStore, queue: &Queue) -> dto_store::StoreResult<usize> {
    let due = store.query_due(DUE_SCAN_LIMIT).await?;
    let mut published = 0;

    for (task_id, priority) in &due {
        match queue.enqueue(task_id, *priority).await {
            Ok(()) => published += 1,
            Err(e) => warn!(task_id = %task_id, error = %e, "failed to republish due task"),
        }
    }

    if !due.is_empty() {
        debug!(found = due.len(), published, "scheduler scan complete");
    }
    Ok(published)
}

/// Run the scheduler loop forever: scan, publish, sleep `interval_seconds`,
/// repeat. Infrastructure errors are logged and the loop continues — the
/// next tick will retry.
pub async fn run(store: TaskStore, queue: Queue, interval_seconds: f64) -> ! {
    info!(interval_seconds, "scheduler loop starting");
    loop {
        match scan_and_publish(&store, &queue).await {
            Ok(published) if published > 0 => info!(published, "republished due tasks"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "scheduler scan failed, will retry next tick"),
        }
        tokio::time::sleep(Duration::from_secs_f64(interval_seconds)).await;
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

    fn test_queue() -> Queue {
        Queue::new("redis://127.0.0.1:6399/0", "dto:test:scheduler").unwrap()
    }

    #[tokio::test]
    async fn scan_finds_nothing_when_db_is_empty() {
        let (_dir, store) = store().await;
        let due = store.query_due(DUE_SCAN_LIMIT).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn scan_excludes_tasks_not_yet_due() {
        let (_dir, store) = store().await;
        let task = store
            .insert_queued("cpu_burn", serde_json::json!({}), None, 0, 5)
            .await
            .unwrap();
        store
            .update_with_event(&task.id, dto_kernel::TaskStatus::Queued, dto_kernel::TaskStatus::Queued, "rescheduled", |t| {
                t.next_run_at = chrono::Utc::now() + chrono::Duration::hours(1);
            })
            .await
            .unwrap();

        let due = store.query_due(DUE_SCAN_LIMIT).await.unwrap();
        assert!(due.is_empty());
    }

    // Exercising the publish half against a live Redis instance: gated
    // behind REDIS_URL so the default test run doesn't require Redis.
    #[tokio::test]
    #[ignore = "requires a reachable Redis instance; run with --ignored and REDIS_URL set"]
    async fn scan_and_publish_republishes_due_tasks() {
        let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for this test");
        let (_dir, store) = store().await;
        let queue = Queue::new(&redis_url, "dto:test:scheduler-live").unwrap();

        store
            .insert_queued("cpu_burn", serde_json::json!({}), None, 0, 5)
            .await
            .unwrap();

        let published = scan_and_publish(&store, &queue).await.unwrap();
        assert_eq!(published, 1);
    }

    #[test]
    fn queue_construction_does_not_require_a_live_server() {
        let _ = test_queue();
    }
}
