//! Physical page geometry and its pixel canvas.
//!
//! The raster canvas is derived from the page size in millimetres and a
//! fixed `mm_per_px` scale. The same scale converts traced pixel coordinates
//! back to machine millimetres in the toolpath emitter.

use serde::{Deserialize, Serialize};

use crate::errors::PlotError;

/// A4 portrait, the sheet the plotter bed is set up for.
pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;
/// 0.08 mm per pixel -> 2625 x 3712 px for A4.
pub const DEFAULT_MM_PER_PX: f64 = 0.08;

/// Fixed physical page with a deterministic pixel canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Page {
    width_mm: f64,
    height_mm: f64,
    mm_per_px: f64,
}

impl Page {
    /// Builds a page, rejecting non-positive sizes or scales and any
    /// combination that would yield an empty canvas.
    pub fn new(width_mm: f64, height_mm: f64, mm_per_px: f64) -> Result<Self, PlotError> {
        if !(mm_per_px.is_finite() && mm_per_px > 0.0) {
            return Err(PlotError::InvalidPage(format!(
                "scale must be a positive number of mm per pixel, got {mm_per_px}"
            )));
        }
        if !(width_mm.is_finite() && height_mm.is_finite()) || width_mm <= 0.0 || height_mm <= 0.0
        {
            return Err(PlotError::InvalidPage(format!(
                "page must have positive size, got {width_mm} x {height_mm} mm"
            )));
        }
        let page = Page {
            width_mm,
            height_mm,
            mm_per_px,
        };
        if page.width_px() == 0 || page.height_px() == 0 {
            return Err(PlotError::InvalidPage(format!(
                "{width_mm} x {height_mm} mm at {mm_per_px} mm/px yields an empty canvas"
            )));
        }
        Ok(page)
    }

    pub fn a4() -> Self {
        Page {
            width_mm: A4_WIDTH_MM,
            height_mm: A4_HEIGHT_MM,
            mm_per_px: DEFAULT_MM_PER_PX,
        }
    }

    pub fn width_mm(&self) -> f64 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    pub fn mm_per_px(&self) -> f64 {
        self.mm_per_px
    }

    /// Canvas width, truncated toward zero.
    pub fn width_px(&self) -> u32 {
        (self.width_mm / self.mm_per_px) as u32
    }

    /// Canvas height, truncated toward zero.
    pub fn height_px(&self) -> u32 {
        (self.height_mm / self.mm_per_px) as u32
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::a4()
    }
}
