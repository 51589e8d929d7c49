//! Cross-platform RS-232 abstraction with a buffered background transfer
//! engine.
//!
//! The crate hides operating-system serial mechanics behind a uniform
//! interface and layers an asynchronous buffering engine on top of the raw
//! byte stream: a dedicated worker thread keeps draining and filling the
//! OS-level buffers while callers interact with lock-protected inbound and
//! outbound buffers and regex-based message extraction.
//!
//! # Modules
//!
//! - `port`: the per-device connection state machine plus the raw-link trait
//!   seam, with a real `serialport`-backed implementation and a scriptable
//!   mock
//! - `engine`: the buffered transfer engine and its background worker
//! - `blocking`: deadline-bounded synchronous reads without the engine
//! - `registry`: candidate device enumeration
//! - `config`: worker timing knobs
//! - `error`: crate-level errors
//!
//! # Example
//!
//! ```no_run
//! use serial_link::{Baudrate, TransferEngine};
//!
//! # fn main() -> Result<(), serial_link::EngineError> {
//! // Try both names the adapter shows up under, whichever answers first.
//! let engine = TransferEngine::open(
//!     vec!["/dev/ttyUSB0".into(), "/dev/ttyACM0".into()],
//!     Baudrate::Baud115200,
//! )?;
//!
//! engine.print("status\n");
//! // Transmission and reception happen in the background; collect whatever
//! // has arrived whenever it suits the caller.
//! let reply = engine.retrieve_read_buffer();
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod config;
pub mod engine;
pub mod error;
pub mod port;
pub mod registry;

// Re-export commonly used types for convenience
pub use blocking::{read_next_byte, read_next_message, read_until, ReadError};
pub use config::EngineConfig;
pub use engine::TransferEngine;
pub use error::EngineError;
pub use port::{
    Baudrate, ConnectionStatus, LinkOpener, MockDevice, MockOpener, NativePort, PortError,
    RawLink, StatusFlag, SystemOpener,
};
