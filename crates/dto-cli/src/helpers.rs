//! Shared helpers used across CLI subcommands: tracing setup and small
//! environment-variable utilities.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the given default log level.
/// `RUST_LOG` overrides it when set.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
