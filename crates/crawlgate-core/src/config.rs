use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_CAPACITY: usize = 3;
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Admission settings, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    capacity: usize,
    queue_timeout: Duration,
    exec_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    /// Build a config. A capacity below 1 is raised to 1, since a gate with
    /// no slots would block every request until it times out.
    pub fn new(capacity: i64, queue_timeout: Duration, exec_timeout: Duration) -> Self {
        let capacity = if capacity < 1 {
            tracing::warn!(
                configured = capacity,
                "Max concurrent crawls must be at least 1, using 1"
            );
            1
        } else {
            usize::try_from(capacity).unwrap_or(usize::MAX)
        };

        Self {
            capacity,
            queue_timeout,
            exec_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Longest a job may wait for a slot.
    pub fn queue_timeout(&self) -> Duration {
        self.queue_timeout
    }

    /// Longest an admitted crawl may run.
    pub fn exec_timeout(&self) -> Duration {
        self.exec_timeout
    }

    /// Read configuration from environment variables.
    ///
    /// - `CRAWLGATE_MAX_CONCURRENT_CRAWLS` (optional, defaults to 3)
    /// - `CRAWLGATE_QUEUE_TIMEOUT` seconds (optional, defaults to 30)
    /// - `CRAWLGATE_CRAWL_TIMEOUT` seconds (optional, defaults to 30)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let capacity = match lookup("CRAWLGATE_MAX_CONCURRENT_CRAWLS") {
            None => DEFAULT_CAPACITY as i64,
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid CRAWLGATE_MAX_CONCURRENT_CRAWLS '{raw}': must be an integer"
                ))
            })?,
        };

        let queue_timeout = parse_seconds(
            "CRAWLGATE_QUEUE_TIMEOUT",
            lookup("CRAWLGATE_QUEUE_TIMEOUT"),
            DEFAULT_QUEUE_TIMEOUT,
        )?;
        let exec_timeout = parse_seconds(
            "CRAWLGATE_CRAWL_TIMEOUT",
            lookup("CRAWLGATE_CRAWL_TIMEOUT"),
            DEFAULT_EXEC_TIMEOUT,
        )?;

        Ok(Self::new(capacity, queue_timeout, exec_timeout))
    }
}

/// Parse a non-negative number of seconds, fractions allowed.
pub fn parse_seconds(
    name: &str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            AppError::ConfigError(format!(
                "Invalid {name} '{raw}': must be a non-negative number of seconds"
            ))
        })
}
