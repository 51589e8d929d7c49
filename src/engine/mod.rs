//! The buffered asynchronous transfer engine.
//!
//! [`TransferEngine`] owns a set of alternative device names for one logical
//! device plus a dedicated background worker thread. The worker continuously
//! moves bytes between the active device and two lock-protected buffers:
//! callers queue outbound text with [`TransferEngine::print`] and collect
//! received data with the `retrieve_*` family, none of which touches the
//! wire directly.
//!
//! # Servicing loop
//!
//! One `work` iteration:
//! 1. with no devices at all, back off hard, since nothing will appear on
//!    its own;
//! 2. with the current device not connected, poll quickly for a reconnect;
//! 3. swap the entire outbound buffer out under its lock and push it to the
//!    device one byte at a time, retrying each byte until the port accepts
//!    it or the connection drops;
//! 4. always attempt exactly one single-byte read, collecting into a
//!    worker-local carry-over;
//! 5. hand the carry-over to the shared inbound buffer if its lock can be
//!    taken within a bounded wait, otherwise keep it for the next iteration.
//!
//! Splitting the OS-facing read (step 4) from delivery into the shared
//! buffer (step 5) keeps the read path from being starved by application
//! lock contention: data can be delayed by a busy caller but never lost.

mod buffer;
mod devices;

use buffer::TransferBuffer;
use devices::DeviceSet;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::port::{
    Baudrate, ConnectionStatus, LinkOpener, NativePort, StatusFlag, SystemOpener,
};
use crate::registry;
use regex::bytes::Regex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Everything the worker and the callers share.
struct EngineCore {
    devices: DeviceSet,
    baud: Baudrate,
    config: EngineConfig,
    inbound: TransferBuffer,
    outbound: TransferBuffer,
    stop: AtomicBool,
}

impl EngineCore {
    /// One pass of the servicing loop.
    ///
    /// `carry` is the worker-local carry-over holding bytes read from the
    /// wire that could not yet be delivered into the shared inbound buffer.
    fn work(&self, carry: &mut Vec<u8>) {
        if self.devices.is_empty() {
            thread::sleep(self.config.idle_backoff());
            return;
        }
        let Some(device) = self.devices.current() else {
            thread::sleep(self.config.idle_backoff());
            return;
        };
        let device = Arc::clone(device);

        if device.status() != ConnectionStatus::Connected {
            thread::sleep(self.config.reconnect_poll());
            return;
        }

        if self.outbound.has_data() {
            let pending = self.outbound.take();
            self.flush_outbound(&device, &pending);
        }

        let mut byte = [0u8; 1];
        if matches!(device.read_raw(&mut byte, true), Some(n) if n >= 1) {
            carry.push(byte[0]);
        }

        if !carry.is_empty()
            && self
                .inbound
                .try_append_for(carry, self.config.inbound_lock_wait())
        {
            carry.clear();
        }
    }

    /// Push `payload` to the device one byte at a time.
    ///
    /// Each byte is retried until the port accepts it or the connection is
    /// observed to drop; a drop aborts only the rest of this payload, never
    /// the worker.
    fn flush_outbound(&self, device: &NativePort, payload: &[u8]) {
        for (sent, unit) in payload.iter().enumerate() {
            let mut reported = false;
            loop {
                if device.status() != ConnectionStatus::Connected {
                    debug!(
                        device = device.name(),
                        dropped = payload.len() - sent,
                        "connection dropped mid-transmission"
                    );
                    return;
                }
                match device.write_raw(std::slice::from_ref(unit), true) {
                    Some(n) if n >= 1 => break,
                    _ => {
                        if !reported {
                            warn!(device = device.name(), "write not accepted, retrying");
                            reported = true;
                        }
                    }
                }
            }
        }
    }
}

/// Cross-platform serial connection with buffered background transfers.
///
/// Construction connects to the first reachable of the given device names
/// and starts the worker; dropping the engine stops the worker, waits for it
/// to finish, and disconnects every device in that order.
///
/// # Example
/// ```no_run
/// use serial_link::{Baudrate, TransferEngine};
///
/// # fn main() -> Result<(), serial_link::EngineError> {
/// let engine = TransferEngine::open(
///     vec!["/dev/ttyUSB0".into(), "/dev/ttyACM0".into()],
///     Baudrate::Baud115200,
/// )?;
/// engine.print("AT\r\n");
/// let reply = engine.retrieve_read_buffer();
/// # let _ = reply;
/// # Ok(())
/// # }
/// ```
pub struct TransferEngine {
    core: Arc<EngineCore>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TransferEngine {
    /// Connect to the first reachable of `device_names` at `baud`.
    pub fn open(device_names: Vec<String>, baud: Baudrate) -> Result<Self, EngineError> {
        Self::with_config(device_names, baud, EngineConfig::default())
    }

    /// Like [`TransferEngine::open`], seeding the name list with every
    /// candidate port the host knows about.
    pub fn autodetect(baud: Baudrate) -> Result<Self, EngineError> {
        Self::open(registry::candidate_ports(), baud)
    }

    /// [`TransferEngine::open`] with explicit worker timing.
    pub fn with_config(
        device_names: Vec<String>,
        baud: Baudrate,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        Self::with_opener(device_names, baud, config, Arc::new(SystemOpener::new()))
    }

    /// Full-control constructor; `opener` decides how names become links.
    pub fn with_opener(
        device_names: Vec<String>,
        baud: Baudrate,
        config: EngineConfig,
        opener: Arc<dyn LinkOpener>,
    ) -> Result<Self, EngineError> {
        let core = build_core(device_names, baud, config, opener)?;
        core.devices.select_active(baud);

        let worker = if core.devices.is_empty() {
            None
        } else {
            let shared = Arc::clone(&core);
            let handle = thread::Builder::new()
                .name("serial-link-worker".into())
                .spawn(move || {
                    let mut carry = Vec::new();
                    while !shared.stop.load(Ordering::Acquire) {
                        shared.work(&mut carry);
                    }
                })?;
            Some(handle)
        };

        Ok(Self { core, worker })
    }

    /// Queue `text` for transmission and return immediately.
    ///
    /// Actual transmission happens asynchronously on the worker once a
    /// device is connected; bytes queued while everything is disconnected
    /// stay queued. Two concurrent calls may interleave their payloads, but
    /// each payload's bytes keep their order.
    pub fn print(&self, text: impl AsRef<[u8]>) {
        self.core.outbound.append(text.as_ref());
    }

    /// Remove and return everything received so far.
    ///
    /// Destructive: a second call without new data returns empty.
    pub fn retrieve_read_buffer(&self) -> Vec<u8> {
        self.core.inbound.take()
    }

    /// Cut the first match of `pattern` out of the received data.
    ///
    /// On a match the buffer keeps only the bytes after it; one match is
    /// consumed per call. `None` when nothing matches, leaving the buffer
    /// as it was.
    pub fn retrieve_first_match(&self, pattern: &Regex) -> Option<Vec<u8>> {
        self.core.inbound.extract_first(pattern)
    }

    /// Cut every match of `pattern` out of the received data in one pass.
    ///
    /// The pass does not re-check for data arriving while it scans; bytes
    /// queued by the worker during the scan are picked up by a later call.
    pub fn retrieve_all_matches(&self, pattern: &Regex) -> Vec<Vec<u8>> {
        self.core.inbound.extract_all(pattern)
    }

    /// Make sure some device is connected, reconnecting if needed.
    ///
    /// Idempotent; returns whether a connected device is now active.
    pub fn connect(&self) -> bool {
        self.core.devices.select_active(self.core.baud)
    }

    /// Disconnect every device unconditionally.
    pub fn disconnect_all(&self) {
        self.core.devices.disconnect_all();
    }

    /// Whether the current device is connected.
    pub fn is_available(&self) -> bool {
        self.current_device()
            .is_some_and(|device| device.status() == ConnectionStatus::Connected)
    }

    /// Name of the current device, if the set is non-empty.
    pub fn device_name(&self) -> Option<String> {
        self.current_device().map(|device| device.name().to_string())
    }

    /// How many devices the engine was constructed with.
    pub fn device_count(&self) -> usize {
        self.core.devices.len()
    }

    /// The device currently used for transfers.
    pub fn current_device(&self) -> Option<Arc<NativePort>> {
        self.core.devices.current().map(Arc::clone)
    }

    /// A device by index; an out-of-range index yields the current device.
    pub fn native_device(&self, index: usize) -> Option<Arc<NativePort>> {
        self.core
            .devices
            .get(index)
            .map(Arc::clone)
            .or_else(|| self.current_device())
    }

    /// The rate every connection is dialed at.
    pub fn baud(&self) -> Baudrate {
        self.core.baud
    }

    /// Whether the current device reports clear-to-send.
    pub fn check_cts(&self) -> bool {
        self.current_device()
            .is_some_and(|device| device.check_flag(StatusFlag::ClearToSend, true))
    }
}

impl Drop for TransferEngine {
    fn drop(&mut self) {
        self.core.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.core.devices.disconnect_all();
    }
}

impl fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("devices", &self.core.devices.len())
            .field("current", &self.device_name())
            .field("baud", &self.core.baud)
            .finish()
    }
}

/// Build the shared state, failing atomically.
///
/// If any device cannot be initialized, every previously built sibling is
/// disconnected and dropped before the error, tagged with the offending
/// name, reaches the caller.
fn build_core(
    device_names: Vec<String>,
    baud: Baudrate,
    config: EngineConfig,
    opener: Arc<dyn LinkOpener>,
) -> Result<Arc<EngineCore>, EngineError> {
    let mut devices = Vec::with_capacity(device_names.len());
    for name in device_names {
        match NativePort::with_opener(name.as_str(), Arc::clone(&opener)) {
            Ok(port) => devices.push(Arc::new(port)),
            Err(source) => {
                for built in &devices {
                    built.disconnect();
                }
                return Err(EngineError::DeviceInit { name, source });
            }
        }
    }
    Ok(Arc::new(EngineCore {
        devices: DeviceSet::new(devices),
        baud,
        config,
        inbound: TransferBuffer::new(),
        outbound: TransferBuffer::new(),
        stop: AtomicBool::new(false),
    }))
}
