//! Rasterizer: draws one batch's placements onto a fresh page-sized canvas.

use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::errors::PlotError;
use crate::layout::{Page, WordPlacement};
use crate::typeface::Typeface;

pub const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Renders every placement of a batch, black on white, onto a new canvas
/// covering the whole page. Earlier batches are not redrawn.
pub fn render(page: &Page, placements: &[WordPlacement], typeface: &Typeface) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(page.width_px(), page.height_px(), PAPER);
    for placement in placements {
        typeface.draw(&mut canvas, &placement.word, placement.x, placement.y, INK);
    }
    debug!(
        words = placements.len(),
        width = canvas.width(),
        height = canvas.height(),
        "Rendered batch canvas"
    );
    canvas
}

/// Writes the canvas as a PNG preview.
pub fn save_preview(canvas: &RgbImage, path: &Path) -> Result<(), PlotError> {
    canvas.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TextExtent;
    use crate::typeface::fallback::BitmapFont;

    fn small_page() -> Page {
        // 40 x 24 mm at 0.5 mm/px -> 80 x 48 px.
        Page::new(40.0, 24.0, 0.5).unwrap()
    }

    fn placement(word: &str, x: i32, y: i32) -> WordPlacement {
        WordPlacement {
            word: word.to_string(),
            extent: TextExtent::default(),
            x,
            y,
        }
    }

    #[test]
    fn test_canvas_matches_page_and_starts_blank() {
        let page = small_page();
        let canvas = render(&page, &[], &Typeface::Bitmap(BitmapFont::for_size(8.0)));
        assert_eq!(canvas.dimensions(), (80, 48));
        assert!(canvas.pixels().all(|p| *p == PAPER));
    }

    #[test]
    fn test_words_are_drawn_at_their_placement() {
        let page = small_page();
        let typeface = Typeface::Bitmap(BitmapFont::for_size(16.0));
        let canvas = render(&page, &[placement("H", 40, 20)], &typeface);

        let inked: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == INK)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty());
        assert!(inked.iter().all(|&(x, y)| x >= 40 && y >= 20));
    }

    #[test]
    fn test_preview_round_trips_through_png() {
        let page = small_page();
        let typeface = Typeface::Bitmap(BitmapFont::for_size(16.0));
        let canvas = render(&page, &[placement("ok", 4, 4)], &typeface);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        save_preview(&canvas, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded, canvas);
    }
}
