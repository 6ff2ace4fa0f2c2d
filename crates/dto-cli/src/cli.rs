//! CLI argument definitions for the DTO orchestrator.

use clap::{Parser, Subcommand};

/// dto -- a distributed task orchestrator.
#[derive(Parser)]
#[command(
    name = "dto",
    version,
    about = "DTO -- distributed task orchestrator",
    long_about = "Submit, schedule, and execute typed work items with durable state, \
                  retry/backoff, and at-least-once delivery."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (task submission, lookup, listing, cancel,
    /// health, metrics).
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 8080)]
        port: u16,
    },

    /// Run the scheduler loop: republish due `QUEUED` tasks onto the queue.
    Scheduler,

    /// Run a worker loop: claim, execute, and report outcomes for queued tasks.
    Worker,

    /// Post the three reference handler payloads to a running API server.
    SeedDemo {
        /// Base URL of the running API server.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        base_url: String,
    },
}
