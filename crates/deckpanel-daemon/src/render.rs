//! Draws navigator state onto the panel.

use crate::config::Config;
use crate::pages::{Face, Look, Navigator};
use anyhow::{Context, Result};
use deckpanel_hw::imaging;
use deckpanel_hw::text::load_font;
use deckpanel_hw::{Link, PanelController, TextButton, BUTTON_COUNT};
use fontdue::Font;
use image::{DynamicImage, Rgb};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns button faces into panel writes.
pub struct Renderer {
    font: Option<Arc<Font>>,
    font_size: f32,
    label_color: Rgb<u8>,
    highlight: Rgb<u8>,
    images: HashMap<PathBuf, DynamicImage>,
}

impl Renderer {
    pub fn new(config: &Config) -> Result<Self> {
        let font = match &config.font {
            Some(path) => Some(
                load_font(path)
                    .with_context(|| format!("Failed to load font {}", path.display()))?,
            ),
            None => None,
        };

        Ok(Self {
            font,
            font_size: config.font_size,
            label_color: config.label_color()?,
            highlight: config.highlight()?,
            images: HashMap::new(),
        })
    }

    /// Redraws every button of the current page.
    pub fn draw_page<L: Link>(
        &mut self,
        panel: &PanelController<L>,
        navigator: &Navigator,
    ) -> deckpanel_hw::Result<()> {
        debug!("Drawing page '{}'", navigator.current().name);
        for index in 0..BUTTON_COUNT {
            self.draw(panel, index, navigator.look(index))?;
        }
        Ok(())
    }

    /// Redraws one button.
    pub fn draw<L: Link>(
        &mut self,
        panel: &PanelController<L>,
        index: usize,
        look: Look<'_>,
    ) -> deckpanel_hw::Result<()> {
        let Some(face) = look.face else {
            return panel.clear_button(index);
        };
        let background = if look.highlighted {
            self.highlight
        } else {
            face.color
        };

        if !look.highlighted {
            if let Some(image) = face.image.as_deref().and_then(|p| self.image(p)) {
                return panel.fill_image(index, image);
            }
        }
        if let Some(button) = self.label(face, background) {
            return panel.write_text(index, &button);
        }
        let [r, g, b] = background.0;
        panel.fill_color(index, i32::from(r), i32::from(g), i32::from(b))
    }

    /// Returns a cached 72x72 copy of an image file, loading it on first use.
    fn image(&mut self, path: &Path) -> Option<&DynamicImage> {
        if !self.images.contains_key(path) {
            match imaging::load(path) {
                Ok(image) => {
                    let button = DynamicImage::ImageRgb8(imaging::button_image(&image));
                    self.images.insert(path.to_path_buf(), button);
                }
                Err(e) => {
                    warn!("Failed to load image {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        self.images.get(path)
    }

    /// Lays out a face's label, centered. `None` without a label or a font.
    fn label(&self, face: &Face, background: Rgb<u8>) -> Option<TextButton> {
        let text = face.label.as_deref()?;
        let font = self.font.as_ref()?;
        Some(TextButton::centered(
            text,
            font.clone(),
            self.font_size,
            self.label_color,
            background,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_needs_font() {
        let renderer = Renderer::new(&Config::default()).unwrap();
        let face = Face {
            label: Some("Play".to_string()),
            color: Rgb([0, 0, 0]),
            image: None,
        };
        assert!(renderer.label(&face, Rgb([0, 0, 0])).is_none());
    }

    #[test]
    fn test_missing_image_is_skipped() {
        let mut renderer = Renderer::new(&Config::default()).unwrap();
        assert!(renderer.image(Path::new("/nonexistent/icon.png")).is_none());
        assert!(renderer.images.is_empty());
    }
}
