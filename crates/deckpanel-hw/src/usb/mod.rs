//! USB link to the panel.
//!
//! The `Link` trait is the byte-level contract the panel controller drives;
//! `UsbLink` implements it on top of libusb.

mod link;

pub use link::{list_serial_numbers, UsbLink};

use crate::Result;

/// Byte-level connection to a panel.
///
/// Implementations serialize their own state and must tolerate `read`
/// blocking on one thread while `write` is called from another.
pub trait Link: Send + Sync {
    /// Opens and claims the device. Marks the link connected on success.
    fn connect(&self) -> Result<()>;

    /// Returns true while the endpoints are usable.
    fn is_connected(&self) -> bool;

    /// Writes one output report.
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Blocks until one input report arrives.
    ///
    /// Any error marks the link disconnected before it is returned.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Releases the device. No-op when disconnected.
    fn close(&self) -> Result<()>;

    /// Reads the device serial number.
    fn serial_number(&self) -> Result<String>;
}
