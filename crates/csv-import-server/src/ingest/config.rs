//! Ingestion configuration
//!
//! Settings for CSV import runs: source location, batch sizing, progress
//! cadence, retry policy and the in-process work queue.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CSV_FILE_PATH: &str = "data/customers-2000000.csv";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_TOTAL_ROWS: i64 = 2_000_000;

/// How the writer finds rows that already exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// One existence lookup per batch, then one multi-row insert
    #[default]
    Bulk,
    /// Insert row by row and treat key conflicts as skips
    PerRow,
}

impl std::str::FromStr for DedupStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bulk" => Ok(DedupStrategy::Bulk),
            "per_row" | "per-row" => Ok(DedupStrategy::PerRow),
            _ => Err(anyhow::anyhow!("Invalid dedup strategy: {}", s)),
        }
    }
}

/// Retry policy for a single batch write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one
    pub backoff_ms: u64,
    /// Upper bound for one attempt, including the lookup and the insert
    pub batch_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 250,
            batch_timeout_secs: 120,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Default source file when a submission names none
    pub csv_file_path: String,
    /// Records per batch
    pub batch_size: usize,
    /// Row count estimate used for percentage and ETA
    pub total_rows: i64,
    /// Report progress to the work queue every N batches
    pub progress_every_batches: u64,
    pub dedup_strategy: DedupStrategy,
    pub retry: RetryPolicy,
    /// Pending submissions the work queue holds before refusing more
    pub queue_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_file_path: DEFAULT_CSV_FILE_PATH.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            total_rows: DEFAULT_TOTAL_ROWS,
            progress_every_batches: 10,
            dedup_strategy: DedupStrategy::Bulk,
            retry: RetryPolicy::default(),
            queue_capacity: 16,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            csv_file_path: std::env::var("CSV_FILE_PATH").unwrap_or(defaults.csv_file_path),
            batch_size: env_or("BATCH_SIZE", defaults.batch_size),
            total_rows: env_or("IMPORT_TOTAL_ROWS", defaults.total_rows),
            progress_every_batches: env_or(
                "IMPORT_PROGRESS_EVERY",
                defaults.progress_every_batches,
            ),
            dedup_strategy: std::env::var("IMPORT_DEDUP_STRATEGY")
                .ok()
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(defaults.dedup_strategy),
            retry: RetryPolicy {
                max_retries: env_or("IMPORT_MAX_BATCH_RETRIES", defaults.retry.max_retries),
                backoff_ms: env_or("IMPORT_RETRY_BACKOFF_MS", defaults.retry.backoff_ms),
                batch_timeout_secs: env_or(
                    "IMPORT_BATCH_TIMEOUT_SECS",
                    defaults.retry.batch_timeout_secs,
                ),
            },
            queue_capacity: env_or("IMPORT_QUEUE_CAPACITY", defaults.queue_capacity),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.csv_file_path.trim().is_empty() {
            anyhow::bail!("CSV_FILE_PATH cannot be empty");
        }
        if self.batch_size == 0 {
            anyhow::bail!("BATCH_SIZE must be greater than 0");
        }
        if self.total_rows <= 0 {
            anyhow::bail!("IMPORT_TOTAL_ROWS must be greater than 0");
        }
        if self.progress_every_batches == 0 {
            anyhow::bail!("IMPORT_PROGRESS_EVERY must be greater than 0");
        }
        if self.retry.batch_timeout_secs == 0 {
            anyhow::bail!("IMPORT_BATCH_TIMEOUT_SECS must be greater than 0");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("IMPORT_QUEUE_CAPACITY must be greater than 0");
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "CSV_FILE_PATH",
        "BATCH_SIZE",
        "IMPORT_TOTAL_ROWS",
        "IMPORT_PROGRESS_EVERY",
        "IMPORT_DEDUP_STRATEGY",
        "IMPORT_MAX_BATCH_RETRIES",
        "IMPORT_RETRY_BACKOFF_MS",
        "IMPORT_BATCH_TIMEOUT_SECS",
        "IMPORT_QUEUE_CAPACITY",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.csv_file_path, DEFAULT_CSV_FILE_PATH);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.total_rows, 2_000_000);
        assert_eq!(config.dedup_strategy, DedupStrategy::Bulk);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("CSV_FILE_PATH", "/tmp/other.csv");
        std::env::set_var("BATCH_SIZE", "250");
        std::env::set_var("IMPORT_DEDUP_STRATEGY", "per_row");

        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.csv_file_path, "/tmp/other.csv");
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.dedup_strategy, DedupStrategy::PerRow);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_batch_size() {
        clear_env();
        std::env::set_var("BATCH_SIZE", "0");
        assert!(IngestConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_strategy() {
        clear_env();
        std::env::set_var("IMPORT_DEDUP_STRATEGY", "magic");
        assert!(IngestConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_ms: 100,
            batch_timeout_secs: 5,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
