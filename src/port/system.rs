//! Production [`RawLink`] implementation backed by the `serialport` crate.
//!
//! The opener applies the fixed frame the whole crate assumes: 8 data bits,
//! no parity, 1 stop bit, no flow control, raw mode, and a read timeout short
//! enough that a raw read returns almost immediately with whatever is
//! available.

use super::error::PortError;
use super::traits::{Baudrate, LinkOpener, RawLink, StatusFlag};
use std::io;
use std::time::Duration;

/// Largest byte count handed to a single OS read call.
const MAX_READ_CHUNK: usize = 4096;

/// How long a raw read may block inside the OS before reporting "no data".
const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Opens system serial devices in raw 8N1 mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl SystemOpener {
    pub fn new() -> Self {
        Self
    }
}

/// Relative names address nodes under /dev, so `ttyUSB0` and `/dev/ttyUSB0`
/// name the same device.
#[cfg(unix)]
fn resolve_device_path(name: &str) -> std::path::PathBuf {
    let path = std::path::Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::Path::new("/dev").join(path)
    }
}

impl LinkOpener for SystemOpener {
    fn open(&self, name: &str, baud: Baudrate) -> Result<Box<dyn RawLink>, PortError> {
        #[cfg(unix)]
        let name = {
            let path = resolve_device_path(name);
            if !path.exists() {
                return Err(PortError::not_found(path.display().to_string()));
            }
            path.to_string_lossy().into_owned()
        };
        #[cfg(not(unix))]
        let name = name.to_string();

        let port = serialport::new(name.as_str(), baud.bits_per_second())
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(name.as_str()),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Box::new(SystemLink { port }))
    }
}

/// Adapter from the `serialport` trait object to [`RawLink`].
struct SystemLink {
    port: Box<dyn serialport::SerialPort>,
}

fn line_state(result: serialport::Result<bool>) -> io::Result<bool> {
    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

impl RawLink for SystemLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::Read;

        let want = buf.len().min(MAX_READ_CHUNK);
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        use std::io::Write;

        match self.port.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn modem_bits(&mut self) -> io::Result<u8> {
        let mut bits = 0u8;
        if line_state(self.port.read_clear_to_send())? {
            bits |= StatusFlag::ClearToSend.mask();
        }
        if line_state(self.port.read_data_set_ready())? {
            bits |= StatusFlag::DataSetReady2.mask();
        }
        if line_state(self.port.read_ring_indicator())? {
            bits |= StatusFlag::Ring.mask();
        }
        if line_state(self.port.read_carrier_detect())? {
            bits |= StatusFlag::DataCarrierDetect.mask();
        }
        Ok(bits)
    }
}
