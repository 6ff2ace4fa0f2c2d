//! Process configuration, loaded from environment variables (optionally
//! via a `.env` file through `dotenvy`), with the reference defaults.

use dto_kernel::RetryPolicy;

use crate::helpers::env_non_empty;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub sqlite_path: String,
    pub redis_url: String,
    pub queue_name: String,
    pub scheduler_interval_seconds: f64,
    pub default_max_attempts: i32,
    pub worker_poll_timeout_seconds: f64,
    pub task_lock_ttl_seconds: u64,
    pub retry_base_seconds: f64,
    pub retry_max_seconds: f64,
    pub retry_jitter_seconds: f64,
    pub max_request_bytes: u64,
}

impl Config {
    /// Load configuration from the environment, falling back to the
    /// reference defaults for any variable that is unset or empty.
    pub fn from_env() -> Self {
        Self {
            api_key: env_non_empty("API_KEY").unwrap_or_else(|| "dev-key".to_string()),
            sqlite_path: env_non_empty("SQLITE_PATH").unwrap_or_else(|| "./orchestrator.sqlite".to_string()),
            redis_url: env_non_empty("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379/0".to_string()),
            queue_name: env_non_empty("QUEUE_NAME").unwrap_or_else(|| "dto:queue".to_string()),
            scheduler_interval_seconds: env_f64("SCHEDULER_INTERVAL_SECONDS", 1.0),
            default_max_attempts: env_i32("DEFAULT_MAX_ATTEMPTS", 5),
            worker_poll_timeout_seconds: env_f64("WORKER_POLL_TIMEOUT_SECONDS", 2.0),
            task_lock_ttl_seconds: env_u64("TASK_LOCK_TTL_SECONDS", 30),
            retry_base_seconds: env_f64("RETRY_BASE_SECONDS", 1.0),
            retry_max_seconds: env_f64("RETRY_MAX_SECONDS", 60.0),
            retry_jitter_seconds: env_f64("RETRY_JITTER_SECONDS", 0.25),
            max_request_bytes: env_u64("MAX_REQUEST_BYTES", 1_048_576),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_base_seconds, self.retry_max_seconds, self.retry_jitter_seconds)
    }

    pub fn lock_key_prefix(&self) -> &'static str {
        "dto:lock"
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    env_non_empty(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env_non_empty(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_non_empty(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        // Run in isolation from the process environment.
        for var in [
            "API_KEY",
            "SQLITE_PATH",
            "REDIS_URL",
            "QUEUE_NAME",
            "SCHEDULER_INTERVAL_SECONDS",
            "DEFAULT_MAX_ATTEMPTS",
            "WORKER_POLL_TIMEOUT_SECONDS",
            "TASK_LOCK_TTL_SECONDS",
            "RETRY_BASE_SECONDS",
            "RETRY_MAX_SECONDS",
            "RETRY_JITTER_SECONDS",
            "MAX_REQUEST_BYTES",
        ] {
            assert!(env_non_empty(var).is_none(), "test environment must not set {var}");
        }

        let config = Config::from_env();
        assert_eq!(config.api_key, "dev-key");
        assert_eq!(config.sqlite_path, "./orchestrator.sqlite");
        assert_eq!(config.redis_url, "redis://localhost:6379/0");
        assert_eq!(config.queue_name, "dto:queue");
        assert_eq!(config.scheduler_interval_seconds, 1.0);
        assert_eq!(config.default_max_attempts, 5);
        assert_eq!(config.worker_poll_timeout_seconds, 2.0);
        assert_eq!(config.task_lock_ttl_seconds, 30);
        assert_eq!(config.retry_base_seconds, 1.0);
        assert_eq!(config.retry_max_seconds, 60.0);
        assert_eq!(config.retry_jitter_seconds, 0.25);
        assert_eq!(config.max_request_bytes, 1_048_576);
    }

    #[test]
    fn lock_key_prefix_matches_spec() {
        assert_eq!(Config::from_env().lock_key_prefix(), "dto:lock");
    }
}
