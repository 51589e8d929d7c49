//! Scriptable in-memory device for testing.
//!
//! [`MockOpener`] stands in for the system backend: names registered through
//! [`MockOpener::device`] open successfully and share their state with the
//! returned [`MockDevice`] handle, so a test can feed reads and inspect
//! writes while an engine owns the link. Unregistered or refused names
//! report not-found; names marked with [`MockOpener::fail`] report a hard
//! open failure.

use super::error::PortError;
use super::traits::{Baudrate, LinkOpener, RawLink};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct DeviceState {
    read_script: VecDeque<u8>,
    write_log: Vec<Vec<u8>>,
    write_attempts: u64,
    fail_next_writes: u32,
    fail_reads: bool,
    modem_bits: u8,
    open_count: u32,
    last_baud: Option<Baudrate>,
}

/// Handle to one scripted device's shared state.
///
/// Cloning the handle shares the state; the handle stays valid after the
/// device has been opened, so tests drive the wire from outside.
///
/// # Example
/// ```
/// use serial_link::port::{Baudrate, LinkOpener, MockOpener, RawLink};
///
/// let opener = MockOpener::new();
/// let device = opener.device("MOCK0");
/// device.push_read(b"ok\n");
///
/// let mut link = opener.open("MOCK0", Baudrate::Baud9600).unwrap();
/// let mut buf = [0u8; 8];
/// let n = link.read(&mut buf).unwrap();
/// assert_eq!(&buf[..n], b"ok\n");
///
/// link.write(b"next").unwrap();
/// assert_eq!(device.written_bytes(), b"next");
/// ```
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Queue bytes the device will yield to subsequent reads.
    pub fn push_read(&self, data: &[u8]) {
        self.state.lock().unwrap().read_script.extend(data);
    }

    /// Bytes queued but not yet read.
    pub fn pending_reads(&self) -> usize {
        self.state.lock().unwrap().read_script.len()
    }

    /// Every write call that reached the device, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// All written bytes flattened into one sequence.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().unwrap().write_log.concat()
    }

    /// Forget everything written so far.
    pub fn clear_write_log(&self) {
        self.state.lock().unwrap().write_log.clear();
    }

    /// Total write calls, including rejected ones.
    pub fn write_attempts(&self) -> u64 {
        self.state.lock().unwrap().write_attempts
    }

    /// Make the next `count` write calls accept nothing.
    pub fn fail_next_writes(&self, count: u32) {
        self.state.lock().unwrap().fail_next_writes = count;
    }

    /// Make every read call fail hard (a broken pipe, not "no data").
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Set the modem status bitmask the device reports.
    pub fn set_modem_bits(&self, bits: u8) {
        self.state.lock().unwrap().modem_bits = bits;
    }

    /// How many times this device has been opened.
    pub fn open_count(&self) -> u32 {
        self.state.lock().unwrap().open_count
    }

    /// The baud rate of the most recent open, if any.
    pub fn last_baud(&self) -> Option<Baudrate> {
        self.state.lock().unwrap().last_baud
    }
}

struct MockLink {
    state: Arc<Mutex<DeviceState>>,
}

impl RawLink for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted read failure",
            ));
        }
        let mut n = 0;
        for slot in buf.iter_mut() {
            match state.read_script.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.write_attempts += 1;
        if state.fail_next_writes > 0 {
            state.fail_next_writes -= 1;
            return Ok(0);
        }
        state.write_log.push(buf.to_vec());
        Ok(buf.len())
    }

    fn modem_bits(&mut self) -> io::Result<u8> {
        Ok(self.state.lock().unwrap().modem_bits)
    }
}

enum Behavior {
    Device(MockDevice),
    Refuse,
    Fail,
}

/// [`LinkOpener`] over a registry of scripted devices.
#[derive(Clone, Default)]
pub struct MockOpener {
    registry: Arc<Mutex<HashMap<String, Behavior>>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as openable and return its state handle.
    ///
    /// Re-registering a name replaces its previous behavior.
    pub fn device(&self, name: &str) -> MockDevice {
        let device = MockDevice::default();
        self.registry
            .lock()
            .unwrap()
            .insert(name.to_string(), Behavior::Device(device.clone()));
        device
    }

    /// Make opening `name` report not-found.
    pub fn refuse(&self, name: &str) {
        self.registry
            .lock()
            .unwrap()
            .insert(name.to_string(), Behavior::Refuse);
    }

    /// Make opening `name` report a hard failure.
    pub fn fail(&self, name: &str) {
        self.registry
            .lock()
            .unwrap()
            .insert(name.to_string(), Behavior::Fail);
    }
}

impl LinkOpener for MockOpener {
    fn open(&self, name: &str, baud: Baudrate) -> Result<Box<dyn RawLink>, PortError> {
        let registry = self.registry.lock().unwrap();
        match registry.get(name) {
            Some(Behavior::Device(device)) => {
                let mut state = device.state.lock().unwrap();
                state.open_count += 1;
                state.last_baud = Some(baud);
                Ok(Box::new(MockLink {
                    state: Arc::clone(&device.state),
                }))
            }
            Some(Behavior::Refuse) | None => Err(PortError::not_found(name)),
            Some(Behavior::Fail) => {
                Err(PortError::config(format!("scripted open failure: {name}")))
            }
        }
    }
}
