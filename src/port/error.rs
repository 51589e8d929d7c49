//! Port-specific error types.
//!
//! These cover the hard failures of the port layer: invalid device names and
//! open attempts that cannot be expressed as a connection status. Expected
//! outcomes of a best-effort connection (device missing, settings rejected)
//! travel as [`crate::port::ConnectionStatus`] values instead.

use thiserror::Error;

/// Errors that can occur while constructing or opening a serial port.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device name is not usable on any platform (empty or embedded NUL).
    #[error("invalid device name: {0:?}")]
    InvalidName(String),

    /// The specified serial port was not found on the system.
    #[error("serial port not found: {0}")]
    NotFound(String),

    /// Port configuration failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
