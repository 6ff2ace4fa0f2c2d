//! # dto-store
//!
//! Durable persistence for the task orchestrator.
//!
//! Provides SQLite-backed storage of `Task` and `TaskEvent` records with WAL
//! mode and mmap for fast reads, an idempotency-keyed uniqueness index, a
//! due-task scan for the scheduler, and cursor-paginated listing for the API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  TaskStore (task_store.rs)               │
//! │    - get / find_by_idempotency_key       │
//! │    - insert_queued (created+enqueued)    │
//! │    - update_with_event (transactional)   │
//! │    - query_due / list_paginated          │
//! ├─────────────────────────────────────────┤
//! │  Cursor (cursor.rs)                      │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL + mmap)          │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use dto_store::{Database, TaskStore};
//!
//! let db = Database::open_and_migrate("orchestrator.sqlite").await?;
//! let tasks = TaskStore::new(db);
//! let task = tasks.insert_queued("cpu_burn", payload, None, 0, 5).await?;
//! ```

pub mod cursor;
pub mod db;
pub mod error;
pub mod migration;
pub mod task_store;

pub use cursor::Cursor;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use task_store::{Task, TaskEvent, TaskStore};
