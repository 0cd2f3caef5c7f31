//! Panel wire protocol.
//!
//! A button image travels as two sequential output reports ("pages"):
//! - Page 1: 16-byte report header + 54-byte BMP header + first 2583 pixels
//! - Page 2: 18-byte report header + remaining 2601 pixels
//!
//! Pixels are written row by row, each row right-to-left, as (R, B, G).
//! The device pairs the pages by order only, so they must be written
//! back to back.
//!
//! Input reports are 17 bytes: a framing byte, one state byte per button
//! and a trailing framing byte.

use crate::{check_button_index, Error, Result, BUTTON_COUNT, BUTTON_SIZE};
use image::RgbImage;
use std::fmt;

/// Number of pixels carried by page 1.
pub const PAGE1_PIXELS: usize = 2583;

/// Number of pixels carried by page 2.
pub const PAGE2_PIXELS: usize = 2601;

/// Bytes per wire pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// Header sizes of the two pages.
pub const PAGE1_HEADER_SIZE: usize = 70;
pub const PAGE2_HEADER_SIZE: usize = 18;

/// Size of one input report.
pub const INPUT_REPORT_SIZE: usize = BUTTON_COUNT + 2;

/// Offset of the 1-based button number in both page headers.
const BUTTON_OFFSET: usize = 5;

/// Page 1 header: report header followed by a 72x72 24-bit BMP header.
const PAGE1_HEADER: [u8; PAGE1_HEADER_SIZE] = [
    // Report header
    0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // BMP file header (size 0x3CF6, pixel data at 0x36)
    0x42, 0x4D, 0xF6, 0x3C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x36, 0x00, 0x00, 0x00,
    // BITMAPINFOHEADER (72x72, 1 plane, 24 bpp, 0x3CC0 bytes, 3780 px/m)
    0x28, 0x00, 0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x01, 0x00, 0x18, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xC0, 0x3C, 0x00, 0x00, 0xC4, 0x0E, 0x00, 0x00, 0xC4, 0x0E, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Page 2 header.
const PAGE2_HEADER: [u8; PAGE2_HEADER_SIZE] = [
    0x02, 0x01, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

/// Physical state of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    Pressed,
    #[default]
    Released,
}

impl ButtonState {
    /// Converts an input report state byte: zero is released, anything else pressed.
    pub fn from_byte(value: u8) -> Self {
        if value == 0 {
            ButtonState::Released
        } else {
            ButtonState::Pressed
        }
    }

    /// Returns true if the button is held down.
    pub fn is_pressed(&self) -> bool {
        matches!(self, ButtonState::Pressed)
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonState::Pressed => write!(f, "pressed"),
            ButtonState::Released => write!(f, "released"),
        }
    }
}

/// The two output reports that fill one button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePair {
    pub page1: Vec<u8>,
    pub page2: Vec<u8>,
}

/// Encodes a 72x72 image for the given button.
pub fn encode_button_image(index: usize, image: &RgbImage) -> Result<PagePair> {
    check_button_index(index)?;
    if image.width() != BUTTON_SIZE || image.height() != BUTTON_SIZE {
        return Err(Error::InvalidImageSize {
            width: image.width(),
            height: image.height(),
        });
    }

    let pixels = wire_pixels(image);
    let (first, second) = pixels.split_at(PAGE1_PIXELS * BYTES_PER_PIXEL);
    // Index was validated above, so the 1-based number fits in a byte.
    let button = (index + 1) as u8;

    let mut page1 = Vec::with_capacity(PAGE1_HEADER_SIZE + first.len());
    page1.extend_from_slice(&PAGE1_HEADER);
    page1[BUTTON_OFFSET] = button;
    page1.extend_from_slice(first);

    let mut page2 = Vec::with_capacity(PAGE2_HEADER_SIZE + second.len());
    page2.extend_from_slice(&PAGE2_HEADER);
    page2[BUTTON_OFFSET] = button;
    page2.extend_from_slice(second);

    Ok(PagePair { page1, page2 })
}

/// Reorders an image into wire order: rows top-down, columns mirrored, (R, B, G).
fn wire_pixels(image: &RgbImage) -> Vec<u8> {
    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity((width * height) as usize * BYTES_PER_PIXEL);
    for y in 0..height {
        for x in (0..width).rev() {
            let [r, g, b] = image.get_pixel(x, y).0;
            data.extend_from_slice(&[r, b, g]);
        }
    }
    data
}

/// Parses an input report into per-button states, in device order.
pub fn parse_input_report(report: &[u8]) -> Result<[ButtonState; BUTTON_COUNT]> {
    if report.len() != INPUT_REPORT_SIZE {
        return Err(Error::InvalidReport(report.len()));
    }

    let mut states = [ButtonState::Released; BUTTON_COUNT];
    // Strip the leading and trailing framing bytes.
    for (state, &byte) in states.iter_mut().zip(&report[1..INPUT_REPORT_SIZE - 1]) {
        *state = ButtonState::from_byte(byte);
    }
    Ok(states)
}
