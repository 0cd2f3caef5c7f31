//! Panel controller: button fills and the button event loop.

use crate::imaging;
use crate::layout;
use crate::protocol::{self, ButtonState, PagePair, INPUT_REPORT_SIZE};
use crate::text::TextButton;
use crate::usb::{Link, UsbLink};
use crate::{check_button_index, Error, Result, BUTTON_COUNT, PRODUCT_ID, VENDOR_ID};
use image::{DynamicImage, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Called once per button transition, off the event loop thread.
pub type ButtonCallback = Arc<dyn Fn(usize, ButtonState) + Send + Sync>;

/// Called after the event loop (re)connects.
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Called when the event loop fails to reconnect, right before it returns.
pub type ConnectFailureCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// State guarded by the controller lock.
struct Shared {
    states: [ButtonState; BUTTON_COUNT],
    on_button: Option<ButtonCallback>,
    on_connect: Option<ConnectCallback>,
    on_connect_failure: Option<ConnectFailureCallback>,
}

impl Shared {
    /// Stores new states and returns the transitions, in ascending index order.
    fn apply(&mut self, states: &[ButtonState; BUTTON_COUNT]) -> Vec<(usize, ButtonState)> {
        let mut changes = Vec::new();
        for (index, (cached, &state)) in self.states.iter_mut().zip(states).enumerate() {
            if *cached != state {
                *cached = state;
                changes.push((index, state));
            }
        }
        changes
    }
}

/// Controller for one panel.
///
/// A single lock covers the cached button states, the callbacks and each
/// page-1/page-2 write pair, so fills from several threads never interleave.
pub struct PanelController<L: Link = UsbLink> {
    link: L,
    shared: Mutex<Shared>,
    reconnect_delay: Duration,
}

impl PanelController<UsbLink> {
    /// Opens the first attached panel, or the one with the given serial number.
    pub fn open(serial: Option<&str>) -> Result<Self> {
        let mut link = UsbLink::new(VENDOR_ID, PRODUCT_ID);
        if let Some(serial) = serial {
            link = link.with_serial(serial);
        }
        Self::with_link(link)
    }
}

impl<L: Link> PanelController<L> {
    /// Connects the link, blanks every button and starts with all buttons released.
    pub fn with_link(link: L) -> Result<Self> {
        link.connect()?;

        let controller = Self {
            link,
            shared: Mutex::new(Shared {
                states: [ButtonState::Released; BUTTON_COUNT],
                on_button: None,
                on_connect: None,
                on_connect_failure: None,
            }),
            reconnect_delay: Duration::ZERO,
        };
        controller.clear_all()?;

        info!("Panel ready");
        Ok(controller)
    }

    /// Sets how long the event loop waits before reconnecting after losing the link.
    ///
    /// Defaults to zero: reconnect immediately.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Returns the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>> {
        self.shared
            .lock()
            .map_err(|_| Error::StatePoisoned("panel"))
    }

    /// Returns the last known state of every button.
    pub fn button_states(&self) -> Result<[ButtonState; BUTTON_COUNT]> {
        Ok(self.lock()?.states)
    }

    /// Registers the button callback, replacing any previous one.
    ///
    /// Safe to call from inside a callback; the new callback sees the next transition.
    pub fn set_event_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(usize, ButtonState) + Send + Sync + 'static,
    {
        self.lock()?.on_button = Some(Arc::new(callback));
        Ok(())
    }

    /// Registers a callback run each time the event loop (re)connects.
    pub fn on_connect<F>(&self, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.lock()?.on_connect = Some(Arc::new(callback));
        Ok(())
    }

    /// Registers a callback run when the event loop gives up reconnecting.
    pub fn on_connect_failure<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.lock()?.on_connect_failure = Some(Arc::new(callback));
        Ok(())
    }

    /// Fills a button with a solid color. Channels must be in 0-255.
    pub fn fill_color(&self, index: usize, r: i32, g: i32, b: i32) -> Result<()> {
        check_button_index(index)?;
        let r = color_channel(r)?;
        let g = color_channel(g)?;
        let b = color_channel(b)?;
        self.write_button(index, &imaging::solid(r, g, b))
    }

    /// Fills a button with an image, resizing it to 72x72 if needed.
    pub fn fill_image(&self, index: usize, image: &DynamicImage) -> Result<()> {
        check_button_index(index)?;
        self.write_button(index, &imaging::button_image(image))
    }

    /// Fills a button with an image loaded from a file.
    pub fn fill_image_from_file(&self, index: usize, path: impl AsRef<Path>) -> Result<()> {
        check_button_index(index)?;
        let image = imaging::load(path)?;
        self.fill_image(index, &image)
    }

    /// Spreads one image across the whole panel.
    ///
    /// Buttons are written 0 through 14; on error the buttons already
    /// written keep their new content.
    pub fn fill_panel_image(&self, image: &DynamicImage) -> Result<()> {
        let tiles = layout::tile_panel_image(image)?;
        for (index, tile) in tiles.iter().enumerate() {
            self.write_button(index, tile)?;
        }
        Ok(())
    }

    /// Spreads an image loaded from a file across the whole panel.
    pub fn fill_panel_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let image = imaging::load(path)?;
        self.fill_panel_image(&image)
    }

    /// Renders lines of text onto a button.
    pub fn write_text(&self, index: usize, button: &TextButton) -> Result<()> {
        check_button_index(index)?;
        self.write_button(index, &button.render())
    }

    /// Fills a button with black.
    pub fn clear_button(&self, index: usize) -> Result<()> {
        self.fill_color(index, 0, 0, 0)
    }

    /// Fills every button with black, from 14 down to 0.
    pub fn clear_all(&self) -> Result<()> {
        for index in (0..BUTTON_COUNT).rev() {
            self.clear_button(index)?;
        }
        Ok(())
    }

    /// Encodes and writes one button image as a page pair.
    fn write_button(&self, index: usize, image: &RgbImage) -> Result<()> {
        let PagePair { page1, page2 } = protocol::encode_button_image(index, image)?;

        let _guard = self.lock()?;
        self.write_page(&page1)?;
        self.write_page(&page2)?;
        debug!("Button {} written ({} + {} bytes)", index, page1.len(), page2.len());
        Ok(())
    }

    /// Writes one page; a short write counts as a failed transfer.
    fn write_page(&self, page: &[u8]) -> Result<()> {
        let written = self.link.write(page)?;
        if written != page.len() {
            warn!("Short page write: {} of {} bytes", written, page.len());
            return Err(Error::Transport(rusb::Error::Io));
        }
        Ok(())
    }

    /// Clears the panel and releases the link.
    pub fn close(&self) -> Result<()> {
        let cleared = self.clear_all();
        if let Err(e) = &cleared {
            warn!("Failed to clear panel before closing: {}", e);
        }
        self.link.close()?;
        cleared
    }

    /// Runs the button event loop until `cancel` is set or reconnecting fails.
    ///
    /// Blocks on the device between reports; `cancel` is only checked once
    /// per report, so a quiet panel delays shutdown until its next report
    /// or link error. A lost link is reconnected; if that fails the error is
    /// returned.
    pub fn run(&self, cancel: &AtomicBool) -> Result<()> {
        let mut report = [0u8; INPUT_REPORT_SIZE];
        let mut link_lost = false;

        info!("Button event loop started");
        loop {
            if cancel.load(Ordering::Acquire) {
                info!("Button event loop cancelled");
                return Ok(());
            }

            if !self.link.is_connected() {
                if link_lost && !self.reconnect_delay.is_zero() {
                    std::thread::sleep(self.reconnect_delay);
                    if cancel.load(Ordering::Acquire) {
                        continue;
                    }
                }
                self.reconnect()?;
                link_lost = false;
            }

            match self.link.read(&mut report) {
                Ok(count) if count == report.len() => {
                    if let Err(e) = self.handle_report(&report) {
                        warn!("Dropping input report: {}", e);
                    }
                }
                Ok(count) => warn!("Short input report ({} bytes), ignored", count),
                Err(e) => {
                    warn!("Lost panel link: {}", e);
                    link_lost = true;
                }
            }
        }
    }

    /// Connects the link and runs the matching notification.
    fn reconnect(&self) -> Result<()> {
        info!("Connecting to panel");
        match self.link.connect() {
            Ok(()) => {
                let callback = self.lock()?.on_connect.clone();
                if let Some(callback) = callback {
                    callback();
                }
                Ok(())
            }
            Err(e) => {
                warn!("Reconnect failed: {}", e);
                let callback = self.lock()?.on_connect_failure.clone();
                if let Some(callback) = callback {
                    callback(&e);
                }
                Err(e)
            }
        }
    }

    /// Debounces one report against the cached states and dispatches the transitions.
    fn handle_report(&self, report: &[u8]) -> Result<Vec<(usize, ButtonState)>> {
        let states = protocol::parse_input_report(report)?;
        let (changes, callback) = {
            let mut shared = self.lock()?;
            let changes = shared.apply(&states);
            (changes, shared.on_button.clone())
        };

        for &(index, state) in &changes {
            debug!("Button {} {}", index, state);
            if let Some(callback) = &callback {
                dispatch(callback.clone(), index, state);
            }
        }
        Ok(changes)
    }
}

/// Runs the callback on its own thread so a slow handler never stalls the loop.
fn dispatch(callback: ButtonCallback, index: usize, state: ButtonState) {
    let spawned = std::thread::Builder::new()
        .name(format!("panel-button-{}", index))
        .spawn(move || callback(index, state));
    if let Err(e) = spawned {
        warn!("Failed to dispatch button {} event: {}", index, e);
    }
}

/// Validates an 8-bit color channel.
fn color_channel(value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::InvalidColorValue(value))
}
