//! Timing knobs for the job lifecycle (polling, retries, eviction).

use std::time::Duration;

/// Default retention window: 2 days.
pub const DEFAULT_RETENTION_HOURS: i64 = 48;

/// Default delay between status fetches for one job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default delay between eviction sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(60_000);

/// Smallest period the poll and sweep timers will run at.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive fetch failures after which a job is marked as failed.
pub const DEFAULT_MAX_FETCH_RETRIES: u32 = 3;

/// Upper bound on a single status fetch or resource delete.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before auto-advancing from the processing view to the editor.
pub const DEFAULT_AUTO_ADVANCE_GRACE: Duration = Duration::from_millis(2000);

/// Lifecycle configuration shared by the registry, pollers, sweeper and
/// view driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long a job is kept after creation.
    pub retention: chrono::Duration,
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
    pub max_fetch_retries: u32,
    pub fetch_timeout: Duration,
    pub delete_timeout: Duration,
    pub auto_advance_grace: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_fetch_retries: DEFAULT_MAX_FETCH_RETRIES,
            fetch_timeout: DEFAULT_IO_TIMEOUT,
            delete_timeout: DEFAULT_IO_TIMEOUT,
            auto_advance_grace: DEFAULT_AUTO_ADVANCE_GRACE,
        }
    }
}

impl LifecycleConfig {
    /// Load overrides from environment variables, falling back to defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `RETENTION_HOURS`       | `48`    |
    /// | `POLL_INTERVAL_MS`      | `2000`  |
    /// | `SWEEP_INTERVAL_MS`     | `60000` |
    /// | `MAX_FETCH_RETRIES`     | `3`     |
    /// | `FETCH_TIMEOUT_SECS`    | `30`    |
    /// | `DELETE_TIMEOUT_SECS`   | `30`    |
    /// | `AUTO_ADVANCE_GRACE_MS` | `2000`  |
    ///
    /// Zero intervals, timeouts and retry ceilings are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let env_parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            retention: lookup("RETENTION_HOURS")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.retention),
            poll_interval: env_parse("POLL_INTERVAL_MS")
                .filter(|n| *n > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            sweep_interval: env_parse("SWEEP_INTERVAL_MS")
                .filter(|n| *n > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            max_fetch_retries: env_parse("MAX_FETCH_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_fetch_retries),
            fetch_timeout: env_parse("FETCH_TIMEOUT_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            delete_timeout: env_parse("DELETE_TIMEOUT_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.delete_timeout),
            auto_advance_grace: env_parse("AUTO_ADVANCE_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.auto_advance_grace),
        }
    }
}
