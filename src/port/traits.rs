//! Raw link contract and wire-level vocabulary.
//!
//! Defines the [`RawLink`] and [`LinkOpener`] traits that allow real serial
//! ports and mock implementations to be used interchangeably, plus the fixed
//! baud rate and modem status flag sets the rest of the crate speaks in.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::io;

/// Line signaling speed, from the fixed supported set.
///
/// Serializes as the plain bits-per-second number, so configuration files can
/// say `115200` instead of naming the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Baudrate {
    Baud110,
    Baud300,
    Baud600,
    Baud1200,
    Baud2400,
    Baud4800,
    #[default]
    Baud9600,
    Baud19200,
    Baud38400,
    Baud57600,
    Baud115200,
}

impl Baudrate {
    /// All supported rates, slowest first.
    pub const ALL: [Baudrate; 11] = [
        Baudrate::Baud110,
        Baudrate::Baud300,
        Baudrate::Baud600,
        Baudrate::Baud1200,
        Baudrate::Baud2400,
        Baudrate::Baud4800,
        Baudrate::Baud9600,
        Baudrate::Baud19200,
        Baudrate::Baud38400,
        Baudrate::Baud57600,
        Baudrate::Baud115200,
    ];

    /// The rate in bits per second, as consumed by the native configure step.
    pub const fn bits_per_second(self) -> u32 {
        match self {
            Baudrate::Baud110 => 110,
            Baudrate::Baud300 => 300,
            Baudrate::Baud600 => 600,
            Baudrate::Baud1200 => 1200,
            Baudrate::Baud2400 => 2400,
            Baudrate::Baud4800 => 4800,
            Baudrate::Baud9600 => 9600,
            Baudrate::Baud19200 => 19200,
            Baudrate::Baud38400 => 38400,
            Baudrate::Baud57600 => 57600,
            Baudrate::Baud115200 => 115_200,
        }
    }
}

impl From<Baudrate> for u32 {
    fn from(rate: Baudrate) -> Self {
        rate.bits_per_second()
    }
}

impl TryFrom<u32> for Baudrate {
    type Error = PortError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|rate| rate.bits_per_second() == raw)
            .ok_or_else(|| PortError::config(format!("unsupported baud rate: {raw}")))
    }
}

impl std::str::FromStr for Baudrate {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u32 = s
            .parse()
            .map_err(|_| PortError::config(format!("unsupported baud rate: {s:?}")))?;
        raw.try_into()
    }
}

/// Modem status lines, named platform neutrally.
///
/// Bit assignments follow the Win32 modem status register: the four input
/// lines (CTS, DSR, ring, carrier detect) occupy distinct bits and each
/// output line aliases the bit the platform reports it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    DataSetReadyLineEnable,
    DataTerminalReady,
    RequestToSend,
    ClearToSend,
    DataCarrierDetect,
    Ring,
    DataSetReady2,
}

impl StatusFlag {
    /// Bit of the modem status bitmask this flag tests.
    pub const fn mask(self) -> u8 {
        match self {
            StatusFlag::RequestToSend | StatusFlag::ClearToSend => 0x10,
            StatusFlag::DataSetReadyLineEnable | StatusFlag::DataSetReady2 => 0x20,
            StatusFlag::Ring => 0x40,
            StatusFlag::DataTerminalReady | StatusFlag::DataCarrierDetect => 0x80,
        }
    }
}

/// One open OS-level serial handle.
///
/// Dropping the link releases the handle and restores the previous port
/// settings, so a link never outlives the connection it belongs to.
pub trait RawLink: Send {
    /// Read whatever is available into `buf` without waiting for more.
    ///
    /// Returning 0 means no data has arrived yet; that is a normal outcome,
    /// not an error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write as much of `buf` as the port accepts, returning the accepted
    /// count. 0 means the port took nothing this time and the caller should
    /// retry.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Snapshot of the modem status lines as a [`StatusFlag`] bitmask.
    fn modem_bits(&mut self) -> io::Result<u8>;
}

/// Opens named devices with the fixed 8N1 raw-mode configuration.
///
/// Implementations must verify that the name is addressable and report
/// [`PortError::NotFound`] when it is not, so the caller can tell a missing
/// device apart from one that refused to communicate.
pub trait LinkOpener: Send + Sync {
    fn open(&self, name: &str, baud: Baudrate) -> Result<Box<dyn RawLink>, PortError>;
}
