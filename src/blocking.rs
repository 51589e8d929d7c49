//! Deadline-bounded synchronous reads over a [`NativePort`].
//!
//! A simpler alternative to the background engine for callers that want
//! plain blocking semantics. Each function polls the port's non-blocking
//! read in a tight loop and gives up once a wall-clock deadline passes, so
//! waiting consumes CPU; reach for [`crate::TransferEngine`] when that
//! matters.

use crate::port::{ConnectionStatus, NativePort};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a blocking read gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The port has no established connection.
    #[error("device is not connected")]
    NotConnected,

    /// No byte arrived within the deadline.
    #[error("no data within {0:?}")]
    Timeout(Duration),
}

/// Wait for a single byte from `device`.
///
/// The deadline is measured from the call start. With `ignore_timeout` set
/// the deadline check is skipped entirely and the call polls until a byte
/// arrives, however long that takes.
pub fn read_next_byte(
    device: &NativePort,
    timeout: Duration,
    ignore_timeout: bool,
) -> Result<u8, ReadError> {
    if device.status() != ConnectionStatus::Connected {
        return Err(ReadError::NotConnected);
    }

    let started = Instant::now();
    let mut byte = [0u8; 1];
    loop {
        // Non-blocking read: lock contention with the engine worker is
        // treated the same as "no data yet" and simply retried.
        if matches!(device.read_raw(&mut byte, false), Some(n) if n >= 1) {
            return Ok(byte[0]);
        }
        if ignore_timeout {
            std::thread::yield_now();
            continue;
        }
        if started.elapsed() > timeout {
            return Err(ReadError::Timeout(timeout));
        }
    }
}

/// Accumulate bytes until one of `stop_bytes` arrives.
///
/// The stop byte is included in the returned message. The timeout bounds the
/// wait for each byte, not the whole message; the first error encountered is
/// propagated and any partial message is discarded.
pub fn read_until(
    device: &NativePort,
    stop_bytes: &[u8],
    timeout: Duration,
    ignore_timeout: bool,
) -> Result<Vec<u8>, ReadError> {
    let mut message = Vec::new();
    loop {
        let byte = read_next_byte(device, timeout, ignore_timeout)?;
        message.push(byte);
        if stop_bytes.contains(&byte) {
            return Ok(message);
        }
    }
}

/// [`read_until`] specialized to newline-terminated messages.
pub fn read_next_message(
    device: &NativePort,
    timeout: Duration,
    ignore_timeout: bool,
) -> Result<Vec<u8>, ReadError> {
    read_until(device, b"\n", timeout, ignore_timeout)
}
