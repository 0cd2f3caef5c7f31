//! Error types for the Deck Panel hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with the panel.
#[derive(Error, Debug)]
pub enum Error {
    /// No USB device matches the vendor and product id.
    #[error("panel not found (VID:PID {vendor_id:04X}:{product_id:04X})")]
    NoDeviceFound { vendor_id: u16, product_id: u16 },

    /// The device does not expose a usable IN/OUT endpoint pair.
    #[error("no {0} endpoint found on device")]
    EndpointNotFound(&'static str),

    /// Panels were found, but none carries the requested serial number.
    #[error("no panel found with serial number {0}")]
    SerialMismatch(String),

    /// USB transfer or libusb error.
    #[error("USB transport error: {0}")]
    Transport(#[from] rusb::Error),

    /// Button index outside 0-14.
    #[error("invalid button index: {0} (must be 0-14)")]
    InvalidButtonIndex(usize),

    /// Color channel outside 0-255.
    #[error("invalid color value: {0} (must be 0-255)")]
    InvalidColorValue(i32),

    /// Image handed to the encoder has the wrong dimensions.
    #[error("invalid image size: expected 72x72, got {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    /// Input report with an unexpected length.
    #[error("invalid input report length: {0}")]
    InvalidReport(usize),

    /// A controller lock was poisoned by a panicking thread.
    #[error("panel state unavailable: {0} lock poisoned")]
    StatePoisoned(&'static str),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Font data could not be parsed.
    #[error("font error: {0}")]
    Font(&'static str),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
