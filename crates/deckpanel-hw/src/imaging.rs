//! Image preparation helpers built on the `image` crate.

use crate::{Result, BUTTON_SIZE};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;

/// Sigma of the unsharp mask applied after resampling.
const SHARPEN_SIGMA: f32 = 1.0;

/// Loads and decodes an image file.
pub fn load(path: impl AsRef<Path>) -> Result<DynamicImage> {
    Ok(image::open(path)?)
}

/// Resizes an image with Lanczos resampling followed by a light sharpen.
pub fn resize(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let resized = imageops::resize(&image.to_rgb8(), width, height, FilterType::Lanczos3);
    imageops::unsharpen(&resized, SHARPEN_SIGMA, 0)
}

/// Cuts a `width` x `height` region out of the center of the image.
///
/// Dimensions larger than the image are clamped to it.
pub fn crop_center(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let width = width.min(image.width());
    let height = height.min(image.height());
    let x = (image.width() - width) / 2;
    let y = (image.height() - height) / 2;
    imageops::crop_imm(image, x, y, width, height).to_image()
}

/// Converts an arbitrary image to a 72x72 RGB button image, resizing if needed.
pub fn button_image(image: &DynamicImage) -> RgbImage {
    if image.width() == BUTTON_SIZE && image.height() == BUTTON_SIZE {
        image.to_rgb8()
    } else {
        resize(image, BUTTON_SIZE, BUTTON_SIZE)
    }
}

/// Creates a button image filled with a single color.
pub fn solid(r: u8, g: u8, b: u8) -> RgbImage {
    RgbImage::from_pixel(BUTTON_SIZE, BUTTON_SIZE, Rgb([r, g, b]))
}

/// Parses a hex color string (`#RRGGBB` or `RRGGBB`).
pub fn parse_hex_color(hex: &str) -> Option<Rgb<u8>> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb([r, g, b]))
}
