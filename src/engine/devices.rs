//! Ordered device collection and the active-device selection policy.

use crate::port::{Baudrate, ConnectionStatus, NativePort};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The alternative device names for one logical device.
///
/// Devices are shared (the engine and callers may both hold one) and ordered
/// by construction. The list is fixed after construction; the current index
/// is the only mutable selector, and it only ever points at a valid entry,
/// so a momentarily stale read by the worker is harmless.
pub(crate) struct DeviceSet {
    devices: Vec<Arc<NativePort>>,
    current: AtomicUsize,
}

impl DeviceSet {
    pub fn new(devices: Vec<Arc<NativePort>>) -> Self {
        Self {
            devices,
            current: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<NativePort>> {
        self.devices.get(index)
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn current(&self) -> Option<&Arc<NativePort>> {
        self.devices.get(self.current_index())
    }

    /// Pick the device transfers should use.
    ///
    /// An already connected current device is kept, avoiding a needless
    /// reconnect. Otherwise every device gets a connect attempt in
    /// construction order and the first connected one wins. With nothing
    /// connected the first merely disconnected device becomes current as a
    /// best-effort fallback while the call still reports failure; devices in
    /// a known-broken state are never chosen as fallback.
    pub fn select_active(&self, baud: Baudrate) -> bool {
        if let Some(device) = self.current() {
            if device.status() == ConnectionStatus::Connected {
                return true;
            }
        }
        for device in &self.devices {
            device.connect(baud);
        }
        self.pick_current()
    }

    fn pick_current(&self) -> bool {
        if let Some(index) = self.position_of(ConnectionStatus::Connected) {
            self.current.store(index, Ordering::Relaxed);
            debug!(device = self.devices[index].name(), "active device selected");
            return true;
        }
        if let Some(index) = self.position_of(ConnectionStatus::Disconnected) {
            self.current.store(index, Ordering::Relaxed);
        }
        false
    }

    fn position_of(&self, status: ConnectionStatus) -> Option<usize> {
        self.devices
            .iter()
            .position(|device| device.status() == status)
    }

    /// Disconnect every device. Safe on an empty set and safe to repeat.
    pub fn disconnect_all(&self) {
        for device in &self.devices {
            device.disconnect();
        }
    }
}
