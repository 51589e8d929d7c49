//! Crate-level error handling.
//!
//! Expected connection outcomes travel as [`crate::port::ConnectionStatus`]
//! values and transient I/O shortfalls as ordinary return values; only
//! failures that leave no usable engine behind are reported through
//! [`EngineError`].

use crate::port::PortError;
use thiserror::Error;

/// Errors surfaced by [`crate::TransferEngine`] construction.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A device object could not be initialized. The engine disconnects and
    /// discards every previously built sibling before reporting this, so no
    /// partial device set is ever left reachable.
    #[error("failed to initialize device {name}: {source}")]
    DeviceInit { name: String, source: PortError },

    /// The background worker thread could not be spawned.
    #[error("failed to spawn transfer worker: {0}")]
    Worker(#[from] std::io::Error),
}
