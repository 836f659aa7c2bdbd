//! Typeface: the font the pipeline measures and draws with.
//!
//! Measurement and drawing share one glyph layout (caret advance + kerning,
//! baseline at the ascent below the draw origin) so the layout engine wraps on
//! exactly the ink the rasterizer produces.

pub mod discovery;
pub mod fallback;

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, Rect, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::layout::{Measure, TextExtent};
use fallback::BitmapFont;

pub use discovery::FontSearch;

pub enum Typeface {
    /// A TrueType/OpenType face loaded from disk.
    Outline {
        font: FontArc,
        scale: PxScale,
        source: PathBuf,
    },
    /// The embedded bitmap font.
    Bitmap(BitmapFont),
}

impl Typeface {
    pub fn outline(font: FontArc, font_size: f32, source: PathBuf) -> Self {
        Typeface::Outline {
            font,
            scale: PxScale::from(font_size),
            source,
        }
    }

    /// Where the face came from, for logs.
    pub fn source(&self) -> Option<&Path> {
        match self {
            Typeface::Outline { source, .. } => Some(source),
            Typeface::Bitmap(_) => None,
        }
    }

    /// Draws `text` with its origin (top-left of the line box) at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        match self {
            Typeface::Outline { font, scale, .. } => {
                draw_text_mut(canvas, color, x, y, *scale, font, text);
            }
            Typeface::Bitmap(bitmap) => bitmap.draw(canvas, text, x, y, color),
        }
    }
}

impl Measure for Typeface {
    /// Placement does not change glyph shapes, so the origin only matters for
    /// consistency with the draw call; the extent is translation-invariant.
    fn measure(&self, text: &str, _x: i32, _y: i32) -> TextExtent {
        match self {
            Typeface::Outline { font, scale, .. } => outline_extent(font, *scale, text),
            Typeface::Bitmap(bitmap) => bitmap.extent(text),
        }
    }
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Outline { scale, source, .. } => f
                .debug_struct("Outline")
                .field("source", source)
                .field("scale", &scale.y)
                .finish(),
            Typeface::Bitmap(bitmap) => f.debug_tuple("Bitmap").field(bitmap).finish(),
        }
    }
}

/// Union of the pixel bounds of every outlined glyph. The width is taken from
/// the draw origin, so a glyph's left bearing is part of it.
fn outline_extent(font: &FontArc, scale: PxScale, text: &str) -> TextExtent {
    let scaled = font.as_scaled(scale);
    let mut caret = 0.0_f32;
    let mut previous: Option<GlyphId> = None;
    let mut bounds: Option<Rect> = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, scaled.ascent()));
        caret += scaled.h_advance(id);
        previous = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bb = outlined.px_bounds();
            bounds = Some(match bounds {
                None => bb,
                Some(acc) => Rect {
                    min: point(acc.min.x.min(bb.min.x), acc.min.y.min(bb.min.y)),
                    max: point(acc.max.x.max(bb.max.x), acc.max.y.max(bb.max.y)),
                },
            });
        }
    }

    bounds
        .map(|b| TextExtent {
            width: b.max.x.max(0.0).ceil() as u32,
            height: (b.max.y - b.min.y).max(0.0).ceil() as u32,
        })
        .unwrap_or_default()
}
