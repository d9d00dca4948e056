//! Accounts database configuration.

use std::time::Duration;

/// Configuration for opening an accounts database.
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Whether to create the root directory if it doesn't exist.
    pub create_if_missing: bool,

    /// How long a description write waits for the account's file lock.
    pub lock_timeout: Duration,

    /// How often a waiting writer retries the file lock.
    pub lock_retry_interval: Duration,

    /// How many random ids to try before giving up on finding an unused one.
    pub max_id_attempts: u32,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            lock_timeout: Duration::from_millis(1000),
            lock_retry_interval: Duration::from_millis(10),
            max_id_attempts: 100,
        }
    }
}

impl AccountsConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the root directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the file lock timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the file lock polling interval.
    #[must_use]
    pub const fn lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval = interval;
        self
    }

    /// Sets the id generation attempt limit.
    #[must_use]
    pub const fn max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts;
        self
    }
}
