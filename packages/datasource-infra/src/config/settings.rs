use std::time::Duration;

use crate::config::tree::ConfigTree;
use crate::error::DbInfraError;

pub const DEFAULT_MAX_RETRY_COUNT: u32 = 10;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;
pub const DEFAULT_FETCH_SIZE: u32 = 5000;

/// Retry schedule handed to the connectivity bridge for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// First try plus every retry.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRY_COUNT,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    pub retry: RetryPolicy,
    pub fetch_size: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }
}

impl BridgeSettings {
    /// Read `maxRetryCount`, `retryDelay` (milliseconds) and `fetchSize` from
    /// the manager subtree, falling back to the defaults.
    pub fn from_config(manager: &ConfigTree) -> Result<Self, DbInfraError> {
        let max_retries = manager.get_u32("maxRetryCount", DEFAULT_MAX_RETRY_COUNT)?;
        let retry_delay_ms = manager.get_u64("retryDelay", DEFAULT_RETRY_DELAY_MS)?;
        let fetch_size = manager.get_u32("fetchSize", DEFAULT_FETCH_SIZE)?;

        Ok(Self {
            retry: RetryPolicy::new(max_retries, Duration::from_millis(retry_delay_ms)),
            fetch_size,
        })
    }
}
