//! CLI entry point for the DTO distributed task orchestrator.
//!
//! Subcommands:
//! - [`serve`](cli::Commands::Serve) — HTTP API server
//! - [`scheduler`](cli::Commands::Scheduler) — due-task republish loop
//! - [`worker`](cli::Commands::Worker) — claim/execute/settle loop
//! - [`seed-demo`](cli::Commands::SeedDemo) — post example payloads to a running server

mod cli;
mod config;
mod helpers;
mod scheduler;
mod seed_demo;
mod worker;

use anyhow::Context;
use clap::Parser;
use dto_kernel::{ExclusionLock, Queue};
use dto_store::{Database, TaskStore};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::helpers::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Serve { bind, port } => run_serve(config, bind, port).await,
        Commands::Scheduler => run_scheduler(config).await,
        Commands::Worker => run_worker(config).await,
        Commands::SeedDemo { base_url } => seed_demo::run(&base_url, &config.api_key).await,
    }
}

async fn run_serve(config: Config, bind: String, port: u16) -> anyhow::Result<()> {
    let db = Database::open_and_migrate(config.sqlite_path.clone())
        .await
        .context("failed to open and migrate database")?;
    let queue = Queue::new(&config.redis_url, config.queue_name.clone()).context("failed to construct queue client")?;

    let web_config = dto_web::WebConfig {
        bind_addr: bind,
        port,
        api_key: config.api_key.clone(),
        max_request_bytes: config.max_request_bytes,
        default_max_attempts: config.default_max_attempts,
    };

    let server = dto_web::WebServer::new(db, queue, web_config);
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

async fn run_scheduler(config: Config) -> anyhow::Result<()> {
    let db = Database::open_and_migrate(config.sqlite_path.clone())
        .await
        .context("failed to open and migrate database")?;
    let store = TaskStore::new(db);
    let queue = Queue::new(&config.redis_url, config.queue_name.clone()).context("failed to construct queue client")?;

    scheduler::run(store, queue, config.scheduler_interval_seconds).await;
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    let db = Database::open_and_migrate(config.sqlite_path.clone())
        .await
        .context("failed to open and migrate database")?;
    let store = TaskStore::new(db);
    let queue = Queue::new(&config.redis_url, config.queue_name.clone()).context("failed to construct queue client")?;
    let lock = ExclusionLock::new(&config.redis_url, config.lock_key_prefix()).context("failed to construct lock client")?;
    let registry = dto_handlers::with_reference_handlers();
    let retry_policy = config.retry_policy();
    let metrics = dto_web::metrics::Metrics::new();

    worker::run(
        store,
        queue,
        lock,
        registry,
        retry_policy,
        metrics,
        config.worker_poll_timeout_seconds,
        config.task_lock_ttl_seconds,
    )
    .await;
}
