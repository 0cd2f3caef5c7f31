//! Deck Panel Hardware Library
//!
//! Drives the 15-key LCD button panel (a 5x3 grid of 72x72 pixel displays)
//! over USB: connection lifecycle, bitmap wire encoding, panel geometry and
//! the button event loop.

pub mod error;
pub mod imaging;
pub mod layout;
pub mod panel;
pub mod protocol;
pub mod text;
pub mod usb;

pub use error::{Error, Result};
pub use layout::Rect;
pub use panel::PanelController;
pub use protocol::{ButtonState, PagePair};
pub use text::{TextButton, TextLine};
pub use usb::{list_serial_numbers, Link, UsbLink};

/// USB VID:PID of the panel.
pub const VENDOR_ID: u16 = 0x0FD9;
pub const PRODUCT_ID: u16 = 0x0060;

/// Number of buttons on the panel.
pub const BUTTON_COUNT: usize = 15;

/// Button grid dimensions.
pub const BUTTON_COLUMNS: u32 = 5;
pub const BUTTON_ROWS: u32 = 3;

/// Edge length of a button display in pixels.
pub const BUTTON_SIZE: u32 = 72;

/// Distance between two neighbouring buttons in pixels.
pub const BUTTON_SPACING: u32 = 19;

/// Full panel dimensions, spacing included (436x254).
pub const PANEL_WIDTH: u32 = BUTTON_COLUMNS * BUTTON_SIZE + (BUTTON_COLUMNS - 1) * BUTTON_SPACING;
pub const PANEL_HEIGHT: u32 = BUTTON_ROWS * BUTTON_SIZE + (BUTTON_ROWS - 1) * BUTTON_SPACING;

/// Checks that a button index addresses one of the 15 buttons.
pub(crate) fn check_button_index(index: usize) -> Result<()> {
    if index >= BUTTON_COUNT {
        return Err(Error::InvalidButtonIndex(index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_dimensions() {
        assert_eq!(PANEL_WIDTH, 436);
        assert_eq!(PANEL_HEIGHT, 254);
        assert_eq!(BUTTON_COUNT as u32, BUTTON_COLUMNS * BUTTON_ROWS);
    }

    #[test]
    fn test_check_button_index() {
        assert!(check_button_index(0).is_ok());
        assert!(check_button_index(14).is_ok());
        assert!(matches!(
            check_button_index(15),
            Err(Error::InvalidButtonIndex(15))
        ));
    }
}
