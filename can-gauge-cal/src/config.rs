//! Protocol configuration types
//!
//! This module defines the timing and retry policy used by the bus and the
//! write-verify protocol. The defaults match what the gauge interface
//! firmware expects; callers normally only tune them for slow buses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for bus waits and write-verify retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Bound on every send and receive wait in milliseconds (default: 1000ms)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Write-verify attempts before giving up (default: 8)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Pause after each verified table row in milliseconds, leaving time for
    /// the EEPROM write cycle (default: 10ms)
    #[serde(default = "default_row_delay")]
    pub row_delay_ms: u64,

    /// How often the inbound worker wakes to check for shutdown (default: 100ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_timeout() -> u64 {
    1000
}

fn default_max_attempts() -> usize {
    8
}

fn default_row_delay() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    100
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            max_attempts: default_max_attempts(),
            row_delay_ms: default_row_delay(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl ProtocolConfig {
    /// Create a new protocol configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the send/receive timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set the number of write-verify attempts
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Builder method: set the pause after each table row
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Builder method: set the inbound worker poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn row_delay(&self) -> Duration {
        Duration::from_millis(self.row_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // Zero would turn the physical read into a busy loop
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::new();
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.row_delay(), Duration::from_millis(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_builder() {
        let config = ProtocolConfig::new()
            .with_timeout(Duration::from_millis(250))
            .with_max_attempts(3)
            .with_row_delay(Duration::ZERO)
            .with_poll_interval(Duration::ZERO);

        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.row_delay(), Duration::ZERO);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
