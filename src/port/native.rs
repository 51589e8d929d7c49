//! The per-device connection state machine.
//!
//! [`NativePort`] owns at most one open [`RawLink`] and serializes every
//! state change and I/O call through one exclusive lock, so connect,
//! disconnect, read and write never race. The connection status itself is
//! kept in an atomic so it can be observed without touching the lock.

use super::error::PortError;
use super::system::SystemOpener;
use super::traits::{Baudrate, LinkOpener, RawLink, StatusFlag};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Connection state of a [`NativePort`].
///
/// The states are mutually exclusive. A port starts out `Disconnected`;
/// `connect` moves it to one of the other three, `disconnect` always brings
/// it back to `Disconnected`. From `PortNotFound` and `OtherError` another
/// `connect` re-attempts the same transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// The connection is established and the port is usable.
    Connected = 0,
    /// No connection is established; the port may still be addressable.
    Disconnected = 1,
    /// The device was not found on the host (unplugged or wrong name).
    PortNotFound = 2,
    /// The device exists but communication could not be established.
    OtherError = 3,
}

/// Lock-free cell holding a [`ConnectionStatus`].
struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    const fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    fn load(&self) -> ConnectionStatus {
        match self.0.load(Ordering::Acquire) {
            0 => ConnectionStatus::Connected,
            1 => ConnectionStatus::Disconnected,
            2 => ConnectionStatus::PortNotFound,
            _ => ConnectionStatus::OtherError,
        }
    }

    fn store(&self, status: ConnectionStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// What the exclusive lock protects: the open link, if any, and the rate it
/// was last dialed at.
struct PortIo {
    link: Option<Box<dyn RawLink>>,
    baud: Baudrate,
}

/// One addressable serial endpoint on the host.
///
/// The device name is fixed for the lifetime of the port. The link is held
/// exactly while the status is [`ConnectionStatus::Connected`].
pub struct NativePort {
    name: String,
    opener: Arc<dyn LinkOpener>,
    status: AtomicStatus,
    io: Mutex<PortIo>,
}

impl NativePort {
    /// Create a port for a system device name. No connection is attempted.
    pub fn new(name: impl Into<String>) -> Result<Self, PortError> {
        Self::with_opener(name, Arc::new(SystemOpener::new()))
    }

    /// Create a port that opens its link through `opener` instead of the
    /// system backend. This is the injection point for mock devices.
    pub fn with_opener(
        name: impl Into<String>,
        opener: Arc<dyn LinkOpener>,
    ) -> Result<Self, PortError> {
        let name = name.into();
        if name.is_empty() || name.contains('\0') {
            return Err(PortError::InvalidName(name));
        }
        Ok(Self {
            name,
            opener,
            status: AtomicStatus::new(ConnectionStatus::Disconnected),
            io: Mutex::new(PortIo {
                link: None,
                baud: Baudrate::default(),
            }),
        })
    }

    /// The device name this port addresses.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current connection status, readable from any thread without blocking.
    pub fn status(&self) -> ConnectionStatus {
        self.status.load()
    }

    /// Try to establish the connection at `baud`.
    ///
    /// Returns immediately when already connected instead of reconnecting;
    /// call [`NativePort::disconnect`] first to force a fresh dial. A missing
    /// device maps to [`ConnectionStatus::PortNotFound`], any other open
    /// failure to [`ConnectionStatus::OtherError`].
    pub fn connect(&self, baud: Baudrate) -> ConnectionStatus {
        let mut io = self.io.lock();
        if self.status.load() == ConnectionStatus::Connected {
            return ConnectionStatus::Connected;
        }
        match self.opener.open(&self.name, baud) {
            Ok(link) => {
                io.link = Some(link);
                io.baud = baud;
                self.status.store(ConnectionStatus::Connected);
                debug!(
                    device = %self.name,
                    rate = baud.bits_per_second(),
                    "serial link established"
                );
            }
            Err(PortError::NotFound(path)) => {
                trace!(device = %self.name, %path, "device not present");
                self.status.store(ConnectionStatus::PortNotFound);
            }
            Err(err) => {
                warn!(device = %self.name, %err, "unable to open device");
                self.status.store(ConnectionStatus::OtherError);
            }
        }
        self.status.load()
    }

    /// Drop the connection.
    ///
    /// Releasing the link closes the OS handle and restores the previous port
    /// settings. No-op unless connected; never fails observably.
    pub fn disconnect(&self) {
        let mut io = self.io.lock();
        if self.status.load() != ConnectionStatus::Connected {
            return;
        }
        self.status.store(ConnectionStatus::Disconnected);
        io.link = None;
        debug!(device = %self.name, "serial link closed");
    }

    /// Re-establish the connection at the previously used rate.
    pub fn reconnect(&self) -> ConnectionStatus {
        let baud = self.io.lock().baud;
        self.disconnect();
        self.connect(baud)
    }

    /// Switch the line speed by dropping and re-dialing the connection.
    pub fn change_baudrate(&self, baud: Baudrate) -> bool {
        self.disconnect();
        self.connect(baud) == ConnectionStatus::Connected
    }

    fn io_guard(&self, block: bool) -> Option<MutexGuard<'_, PortIo>> {
        if block {
            Some(self.io.lock())
        } else {
            self.io.try_lock()
        }
    }

    /// Perform one read from the port into `buf`.
    ///
    /// Returns `None` when the port is not connected, when `block` is false
    /// and the lock is already held by someone else, or when the read fails
    /// hard. `Some(0)` means no data was available, which is a normal
    /// outcome to retry later.
    pub fn read_raw(&self, buf: &mut [u8], block: bool) -> Option<usize> {
        let mut io = self.io_guard(block)?;
        let link = io.link.as_mut()?;
        match link.read(buf) {
            Ok(n) => Some(n),
            Err(err) => {
                trace!(device = %self.name, %err, "raw read failed");
                None
            }
        }
    }

    /// Perform one write, returning how many bytes the port accepted.
    ///
    /// Same locking contract as [`NativePort::read_raw`]; `Some(0)` means
    /// the port accepted nothing this time.
    pub fn write_raw(&self, buf: &[u8], block: bool) -> Option<usize> {
        let mut io = self.io_guard(block)?;
        let link = io.link.as_mut()?;
        match link.write(buf) {
            Ok(n) => Some(n),
            Err(err) => {
                trace!(device = %self.name, %err, "raw write failed");
                None
            }
        }
    }

    /// Snapshot of the modem status bitmask, or `None` when the port is not
    /// connected or the query fails.
    pub fn modem_status(&self, block: bool) -> Option<u8> {
        let mut io = self.io_guard(block)?;
        let link = io.link.as_mut()?;
        link.modem_bits().ok()
    }

    /// Test one modem status line.
    ///
    /// False when the flag is clear, the port is not connected, or the
    /// status query fails.
    pub fn check_flag(&self, flag: StatusFlag, block: bool) -> bool {
        self.modem_status(block)
            .is_some_and(|bits| bits & flag.mask() != 0)
    }
}

impl fmt::Debug for NativePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePort")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}
