//! Engine timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for the background transfer worker.
///
/// The defaults match the servicing cadence described in [`crate::engine`]:
/// a hard back-off while there is nothing to service, a fast poll while
/// waiting for a reconnect, and a short bound on how long the worker waits
/// for the inbound buffer lock before deferring delivery to the next
/// iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sleep between iterations while the device set is empty.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Sleep between iterations while the current device is not connected.
    #[serde(default = "default_reconnect_poll_ms")]
    pub reconnect_poll_ms: u64,

    /// Longest wait for the inbound buffer lock before carrying data over.
    #[serde(default = "default_inbound_lock_wait_ms")]
    pub inbound_lock_wait_ms: u64,
}

/// Default back-off while no devices are configured (100 ms).
pub fn default_idle_backoff_ms() -> u64 {
    100
}

/// Default poll interval while disconnected (1 ms).
pub fn default_reconnect_poll_ms() -> u64 {
    1
}

/// Default bound on waiting for the inbound buffer lock (1 ms).
pub fn default_inbound_lock_wait_ms() -> u64 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: default_idle_backoff_ms(),
            reconnect_poll_ms: default_reconnect_poll_ms(),
            inbound_lock_wait_ms: default_inbound_lock_wait_ms(),
        }
    }
}

impl EngineConfig {
    pub(crate) fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub(crate) fn reconnect_poll(&self) -> Duration {
        Duration::from_millis(self.reconnect_poll_ms)
    }

    pub(crate) fn inbound_lock_wait(&self) -> Duration {
        Duration::from_millis(self.inbound_lock_wait_ms)
    }
}
