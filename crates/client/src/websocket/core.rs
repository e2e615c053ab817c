//! Runtime-agnostic reconnection logic for room sessions.
//!
//! The session task owns the socket; this module only decides whether a
//! closed session may reconnect and how long it waits first.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Attempt-count scaled backoff.
///
/// The delay before a reconnect is `step * attempts`, where `attempts` is the
/// number of reconnects already made since the last successful open. The first
/// reconnect therefore happens immediately, followed by `step`, `2 * step`, ...
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    enabled: bool,
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(enabled: bool, config: ReconnectConfig) -> Self {
        Self {
            enabled,
            config,
            attempts: 0,
        }
    }

    /// Called on every successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Record a reconnect and return how long to wait before it.
    ///
    /// Returns `None` when auto-reconnect is disabled or the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.enabled || self.is_exhausted() {
            return None;
        }

        let delay_ms = self.config.step_ms.saturating_mul(u64::from(self.attempts));
        self.attempts += 1;
        Some(Duration::from_millis(delay_ms))
    }
}
