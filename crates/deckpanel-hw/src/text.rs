//! Text buttons rendered with fontdue.

use crate::{Error, Result, BUTTON_SIZE};
use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;

/// Line height as a multiple of the font size.
const LINE_SPACING: f32 = 1.2;

/// Loads a TrueType/OpenType font from a file.
pub fn load_font(path: impl AsRef<Path>) -> Result<Arc<Font>> {
    let data = std::fs::read(path)?;
    let font = Font::from_bytes(data, FontSettings::default()).map_err(Error::Font)?;
    Ok(Arc::new(font))
}

/// One line of text on a button.
#[derive(Clone)]
pub struct TextLine {
    pub text: String,
    /// Left edge of the first glyph.
    pub x: i32,
    /// Baseline position.
    pub baseline: i32,
    /// Font size in pixels.
    pub size: f32,
    pub color: Rgb<u8>,
    pub font: Arc<Font>,
}

impl TextLine {
    /// Draws the line onto a canvas, alpha blending glyph coverage.
    pub fn draw(&self, canvas: &mut RgbImage) {
        let (width, height) = canvas.dimensions();
        let mut cursor_x = self.x as f32;

        for ch in self.text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            let left = cursor_x.round() as i32 + metrics.xmin;
            let top = self.baseline - metrics.ymin - metrics.height as i32;

            for glyph_y in 0..metrics.height {
                for glyph_x in 0..metrics.width {
                    let coverage = bitmap[glyph_y * metrics.width + glyph_x];
                    if coverage == 0 {
                        continue;
                    }
                    let px = left + glyph_x as i32;
                    let py = top + glyph_y as i32;
                    if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                        continue;
                    }

                    let alpha = coverage as f32 / 255.0;
                    let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                    for (dst, src) in pixel.0.iter_mut().zip(self.color.0) {
                        *dst = (src as f32 * alpha + *dst as f32 * (1.0 - alpha)) as u8;
                    }
                }
            }

            cursor_x += metrics.advance_width;
        }
    }

    /// Returns the advance width of the line in pixels.
    pub fn width(&self) -> f32 {
        self.text
            .chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width)
            .sum()
    }
}

/// Background color plus lines of text, rendered to a button image.
///
/// Making the lines fit is up to the caller.
#[derive(Clone)]
pub struct TextButton {
    pub lines: Vec<TextLine>,
    pub background: Rgb<u8>,
}

impl TextButton {
    pub fn new(background: Rgb<u8>) -> Self {
        Self {
            lines: Vec::new(),
            background,
        }
    }

    /// Lays out text centered on the button, one `TextLine` per line of input.
    pub fn centered(
        text: &str,
        font: Arc<Font>,
        size: f32,
        color: Rgb<u8>,
        background: Rgb<u8>,
    ) -> Self {
        let mut lines: Vec<TextLine> = text
            .lines()
            .map(|line| TextLine {
                text: line.to_string(),
                x: 0,
                baseline: 0,
                size,
                color,
                font: font.clone(),
            })
            .collect();

        let widths: Vec<f32> = lines.iter().map(TextLine::width).collect();
        for (line, (x, baseline)) in lines.iter_mut().zip(line_origins(&widths, size)) {
            line.x = x;
            line.baseline = baseline;
        }
        Self { lines, background }
    }

    /// Renders the button to a 72x72 image.
    pub fn render(&self) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(BUTTON_SIZE, BUTTON_SIZE, self.background);
        for line in &self.lines {
            line.draw(&mut canvas);
        }
        canvas
    }
}

/// Origins (left edge, baseline) that center a block of lines on a button.
fn line_origins(widths: &[f32], size: f32) -> Vec<(i32, i32)> {
    let line_height = size * LINE_SPACING;
    let block = line_height * widths.len() as f32;
    let top = (BUTTON_SIZE as f32 - block) / 2.0;

    widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let x = ((BUTTON_SIZE as f32 - width) / 2.0).round() as i32;
            let baseline = (top + line_height * i as f32 + size).round() as i32;
            (x, baseline)
        })
        .collect()
}
