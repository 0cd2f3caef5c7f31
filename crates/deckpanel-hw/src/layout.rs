//! Panel geometry.
//!
//! Buttons are numbered row by row from the top, but within a row the
//! numbering runs right-to-left across the physical panel:
//!
//! ```text
//!  4  3  2  1  0
//!  9  8  7  6  5
//! 14 13 12 11 10
//! ```

use crate::imaging;
use crate::{
    check_button_index, Result, BUTTON_COLUMNS, BUTTON_COUNT, BUTTON_SIZE, BUTTON_SPACING,
    PANEL_HEIGHT, PANEL_WIDTH,
};
use image::{imageops, DynamicImage, RgbImage};

/// Distance from one button's left (top) edge to the next one's.
const BUTTON_PITCH: u32 = BUTTON_SIZE + BUTTON_SPACING;

/// Pixel rectangle within the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Returns the rectangle of a button within a full panel image.
pub fn button_rect(index: usize) -> Result<Rect> {
    check_button_index(index)?;
    let row = index as u32 / BUTTON_COLUMNS;
    let col = index as u32 % BUTTON_COLUMNS;
    Ok(Rect {
        x: PANEL_WIDTH - BUTTON_SIZE - col * BUTTON_PITCH,
        y: row * BUTTON_PITCH,
        width: BUTTON_SIZE,
        height: BUTTON_SIZE,
    })
}

/// Returns the button under a panel pixel, or `None` for spacing and out-of-panel pixels.
pub fn button_at(x: u32, y: u32) -> Option<usize> {
    if x >= PANEL_WIDTH || y >= PANEL_HEIGHT {
        return None;
    }
    // Measure columns from the right edge to undo the mirroring.
    let from_right = PANEL_WIDTH - 1 - x;
    if from_right % BUTTON_PITCH >= BUTTON_SIZE || y % BUTTON_PITCH >= BUTTON_SIZE {
        return None;
    }
    let col = from_right / BUTTON_PITCH;
    let row = y / BUTTON_PITCH;
    Some((row * BUTTON_COLUMNS + col) as usize)
}

/// Scales and crops an image to exactly the panel size.
///
/// The image is first resized to the panel width (keeping its aspect ratio),
/// then center-cropped if it is still larger than the panel. Anything the
/// image does not cover is left black.
pub fn fit_panel_image(image: &DynamicImage) -> RgbImage {
    let mut fitted = if image.width() != PANEL_WIDTH {
        let ratio = image.width() as f32 / PANEL_WIDTH as f32;
        let height = ((image.height() as f32 / ratio) as u32).max(1);
        imaging::resize(image, PANEL_WIDTH, height)
    } else {
        image.to_rgb8()
    };

    if fitted.width() > PANEL_WIDTH || fitted.height() > PANEL_HEIGHT {
        fitted = imaging::crop_center(&fitted, PANEL_WIDTH, PANEL_HEIGHT);
    }

    if fitted.dimensions() == (PANEL_WIDTH, PANEL_HEIGHT) {
        return fitted;
    }
    let mut canvas = RgbImage::new(PANEL_WIDTH, PANEL_HEIGHT);
    imageops::replace(&mut canvas, &fitted, 0, 0);
    canvas
}

/// Cuts a panel-sized image into the 15 button images, in index order.
pub fn tile_panel_image(image: &DynamicImage) -> Result<Vec<RgbImage>> {
    let panel = fit_panel_image(image);
    (0..BUTTON_COUNT)
        .map(|index| {
            let rect = button_rect(index)?;
            Ok(imageops::crop_imm(&panel, rect.x, rect.y, rect.width, rect.height).to_image())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BUTTON_ROWS, Error};
    use image::Rgb;

    #[test]
    fn test_button_rect_corners() {
        assert_eq!(
            button_rect(0).unwrap(),
            Rect {
                x: PANEL_WIDTH - BUTTON_SIZE,
                y: 0,
                width: BUTTON_SIZE,
                height: BUTTON_SIZE
            }
        );
        assert_eq!(button_rect(4).unwrap().x, 0);
        assert_eq!(button_rect(10).unwrap().y, 2 * BUTTON_PITCH);
        assert_eq!(button_rect(14).unwrap().x, 0);
        assert_eq!(button_rect(14).unwrap().bottom(), PANEL_HEIGHT);
    }

    #[test]
    fn test_button_rect_invalid() {
        assert!(matches!(button_rect(15), Err(Error::InvalidButtonIndex(15))));
    }

    #[test]
    fn test_rects_do_not_overlap() {
        let rects: Vec<Rect> = (0..BUTTON_COUNT).map(|i| button_rect(i).unwrap()).collect();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_rects_reconstruct_panel() {
        // Undo the mirroring: the rectangle of logical column c must sit at
        // physical column (COLUMNS - 1 - c), laid out left to right.
        for index in 0..BUTTON_COUNT {
            let rect = button_rect(index).unwrap();
            let col = index as u32 % BUTTON_COLUMNS;
            let row = index as u32 / BUTTON_COLUMNS;
            let physical_col = BUTTON_COLUMNS - 1 - col;
            assert_eq!(rect.x, physical_col * BUTTON_PITCH);
            assert_eq!(rect.y, row * BUTTON_PITCH);
        }

        let min_x = (0..BUTTON_COUNT).map(|i| button_rect(i).unwrap().x).min();
        let max_right = (0..BUTTON_COUNT).map(|i| button_rect(i).unwrap().right()).max();
        let min_y = (0..BUTTON_COUNT).map(|i| button_rect(i).unwrap().y).min();
        let max_bottom = (0..BUTTON_COUNT).map(|i| button_rect(i).unwrap().bottom()).max();
        assert_eq!(min_x, Some(0));
        assert_eq!(max_right, Some(PANEL_WIDTH));
        assert_eq!(min_y, Some(0));
        assert_eq!(max_bottom, Some(PANEL_HEIGHT));

    }

    #[test]
    fn test_every_pixel_is_spacing_or_one_button() {
        let rects: Vec<Rect> = (0..BUTTON_COUNT).map(|i| button_rect(i).unwrap()).collect();
        let mut covered = 0u32;

        for y in 0..PANEL_HEIGHT {
            for x in 0..PANEL_WIDTH {
                let hits: Vec<usize> = (0..BUTTON_COUNT)
                    .filter(|&i| rects[i].contains(x, y))
                    .collect();
                match button_at(x, y) {
                    None => assert!(hits.is_empty(), "({}, {}) is spacing but hit {:?}", x, y, hits),
                    Some(index) => {
                        assert_eq!(hits, vec![index], "({}, {})", x, y);
                        covered += 1;
                    }
                }
            }
        }
        assert_eq!(covered, BUTTON_COUNT as u32 * BUTTON_SIZE * BUTTON_SIZE);
        assert_eq!(covered, (BUTTON_COLUMNS * BUTTON_SIZE) * (BUTTON_ROWS * BUTTON_SIZE));
    }

    #[test]
    fn test_button_at_inverts_button_rect() {
        for index in 0..BUTTON_COUNT {
            let rect = button_rect(index).unwrap();
            assert_eq!(button_at(rect.x, rect.y), Some(index));
            assert_eq!(button_at(rect.right() - 1, rect.bottom() - 1), Some(index));
        }
        assert_eq!(button_at(BUTTON_SIZE, 0), None);
        assert_eq!(button_at(0, BUTTON_SIZE + 1), None);
        assert_eq!(button_at(PANEL_WIDTH, 0), None);
    }

    #[test]
    fn test_fit_panel_image_exact_size_is_untouched() {
        let source = RgbImage::from_fn(PANEL_WIDTH, PANEL_HEIGHT, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 9])
        });
        let fitted = fit_panel_image(&DynamicImage::ImageRgb8(source.clone()));
        assert_eq!(fitted, source);
    }

    #[test]
    fn test_fit_panel_image_crops_tall_image() {
        let source = DynamicImage::ImageRgb8(RgbImage::new(PANEL_WIDTH, PANEL_HEIGHT * 2));
        let fitted = fit_panel_image(&source);
        assert_eq!(fitted.dimensions(), (PANEL_WIDTH, PANEL_HEIGHT));
    }

    #[test]
    fn test_fit_panel_image_scales_wide_image() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            PANEL_WIDTH * 2,
            PANEL_HEIGHT,
            Rgb([200, 0, 0]),
        ));
        let fitted = fit_panel_image(&source);
        assert_eq!(fitted.dimensions(), (PANEL_WIDTH, PANEL_HEIGHT));
        // Half-height after scaling: the bottom rows stay black.
        assert_eq!(fitted.get_pixel(10, PANEL_HEIGHT - 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_tile_panel_image() {
        let source = RgbImage::from_fn(PANEL_WIDTH, PANEL_HEIGHT, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, (x / 256) as u8])
        });
        let tiles = tile_panel_image(&DynamicImage::ImageRgb8(source.clone())).unwrap();
        assert_eq!(tiles.len(), BUTTON_COUNT);
        for (index, tile) in tiles.iter().enumerate() {
            let rect = button_rect(index).unwrap();
            assert_eq!(tile.dimensions(), (BUTTON_SIZE, BUTTON_SIZE));
            assert_eq!(tile.get_pixel(0, 0), source.get_pixel(rect.x, rect.y));
        }
    }
}
