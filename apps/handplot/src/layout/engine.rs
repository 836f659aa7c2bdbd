//! Layout Engine: places the words of each batch on the page.
//!
//! # Cursor lifetime
//! One `LayoutEngine` lives for the whole process. Its `Cursor` carries over
//! from batch to batch so successive transcripts continue where the last one
//! stopped. Only the batch coordinator drives it, one batch at a time.
//!
//! # Algorithm
//! Greedy word-wrap against the page's right edge, measured with the same
//! text metrics the rasterizer draws with. A word wider than the page is
//! placed as-is (it overhangs the right edge). Text is never bounded against
//! the bottom edge; the engine only warns once the cursor leaves the page.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout::page::Page;

// ────────────────────────────────────────────────────────────────────────────
// Measurement seam
// ────────────────────────────────────────────────────────────────────────────

/// Extent of a rendered string, in pixels.
///
/// `width` runs from the draw origin to the rightmost ink column, so any left
/// bearing is counted. `height` is the height of the ink bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

/// Anything that can report the rendered extent of a string.
///
/// `x`/`y` is the draw origin the string would be rendered at. `x + width` is
/// the right ink edge of the drawn string, which is what wrapping checks.
pub trait Measure {
    fn measure(&self, text: &str, x: i32, y: i32) -> TextExtent;
}

// ────────────────────────────────────────────────────────────────────────────
// Settings, cursor, placements
// ────────────────────────────────────────────────────────────────────────────

/// Spacing parameters, all in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    /// Nominal font size; also the line advance before `line_spacing`.
    pub font_size: u32,
    pub word_spacing: u32,
    pub line_spacing: u32,
    /// X position every wrapped line restarts at.
    pub left_margin: i32,
    /// Where the very first word of the process lands.
    pub origin: (i32, i32),
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            font_size: 200,
            word_spacing: 30,
            line_spacing: 50,
            left_margin: 10,
            origin: (10, 10),
        }
    }
}

/// Persistent insertion point plus the lowest ink edge placed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: i32,
    pub y: i32,
    /// Running maximum of `y + height` over every placed word. Never decreases.
    pub max_y: i32,
}

impl Cursor {
    pub fn at(x: i32, y: i32) -> Self {
        Cursor { x, y, max_y: y }
    }
}

/// One word positioned on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPlacement {
    pub word: String,
    pub extent: TextExtent,
    pub x: i32,
    pub y: i32,
}

impl WordPlacement {
    /// X coordinate of the right ink edge.
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.extent.width)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    page: Page,
    settings: LayoutSettings,
    cursor: Cursor,
    overflow_reported: bool,
}

impl LayoutEngine {
    pub fn new(page: Page, settings: LayoutSettings) -> Self {
        let (x, y) = settings.origin;
        LayoutEngine {
            page,
            settings,
            cursor: Cursor::at(x, y),
            overflow_reported: false,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Places every whitespace-separated word of `batch`, advancing the cursor.
    ///
    /// An empty or all-whitespace batch returns no placements and leaves the
    /// cursor exactly where it was.
    pub fn place(&mut self, batch: &str, metrics: &impl Measure) -> Vec<WordPlacement> {
        let words: Vec<&str> = batch.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let page_width = i64::from(self.page.width_px());
        let word_spacing = self.settings.word_spacing as i32;
        let line_advance = (self.settings.font_size + self.settings.line_spacing) as i32;

        let mut x = self.cursor.x;
        let mut y = self.cursor.y;
        let mut max_y = self.cursor.max_y;
        let mut placements = Vec::with_capacity(words.len());

        for word in words {
            let mut placement = WordPlacement {
                word: word.to_string(),
                extent: metrics.measure(word, x, y),
                x,
                y,
            };
            if placement.right() > page_width {
                placement.x = self.settings.left_margin;
                placement.y += line_advance;
            }

            let extent = placement.extent;
            x = placement.x + extent.width as i32 + word_spacing;
            y = placement.y;
            max_y = max_y.max(y + extent.height as i32);
            placements.push(placement);
        }

        // Force a line break for the next batch when no further word could start here.
        self.cursor = if i64::from(x) + i64::from(word_spacing) > page_width {
            Cursor {
                x: self.settings.left_margin,
                y: max_y + self.settings.line_spacing as i32,
                max_y,
            }
        } else {
            Cursor { x, y, max_y }
        };

        self.report_overflow();
        placements
    }

    fn report_overflow(&mut self) {
        if self.overflow_reported {
            return;
        }
        if i64::from(self.cursor.max_y) > i64::from(self.page.height_px()) {
            self.overflow_reported = true;
            warn!(
                max_y = self.cursor.max_y,
                page_height = self.page.height_px(),
                "Layout: text has run past the bottom of the page; continuing unbounded"
            );
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
