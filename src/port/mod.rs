//! Port abstraction layer.
//!
//! The [`RawLink`]/[`LinkOpener`] traits form the seam between the
//! platform-independent connection logic and the OS: [`SystemOpener`] is the
//! real `serialport`-backed implementation, [`MockOpener`] a scriptable
//! in-memory stand-in. [`NativePort`] layers the connection state machine
//! and the locking discipline on top of whichever link it is given.

pub mod error;
pub mod mock;
pub mod native;
pub mod system;
pub mod traits;

pub use error::PortError;
pub use mock::{MockDevice, MockOpener};
pub use native::{ConnectionStatus, NativePort};
pub use system::SystemOpener;
pub use traits::{Baudrate, LinkOpener, RawLink, StatusFlag};
