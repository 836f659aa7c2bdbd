//! Text batch -> `.nc` file: layout, raster, contours, toolpath.
//!
//! `Pipeline` owns the only long-lived mutable state of the system: the
//! layout cursor and the lazily resolved typeface. It is synchronous and
//! CPU-bound; the coordinator calls it from `spawn_blocking` while holding
//! the pipeline lock, so at most one batch is ever in flight.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::contour::{self, ContourSettings};
use crate::errors::PlotError;
use crate::layout::page::{A4_HEIGHT_MM, A4_WIDTH_MM};
use crate::layout::{LayoutEngine, LayoutSettings, Page};
use crate::raster;
use crate::toolpath::{self, writer, ToolSettings, ToolpathProgram};
use crate::typeface::{FontSearch, Typeface};

/// What one processed batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub program_path: PathBuf,
    pub preview_path: Option<PathBuf>,
    pub words: usize,
    pub contours: usize,
}

pub struct Pipeline {
    layout: LayoutEngine,
    font_search: FontSearch,
    typeface: Option<Typeface>,
    contour_settings: ContourSettings,
    tool: ToolSettings,
    output_dir: PathBuf,
    /// Where rendered canvases are kept; `None` skips the preview.
    preview_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        page: Page,
        layout: LayoutSettings,
        font_search: FontSearch,
        tool: ToolSettings,
        output_dir: PathBuf,
    ) -> Self {
        Pipeline {
            layout: LayoutEngine::new(page, layout),
            font_search,
            typeface: None,
            contour_settings: ContourSettings::default(),
            tool,
            output_dir,
            preview_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, PlotError> {
        let page = Page::new(A4_WIDTH_MM, A4_HEIGHT_MM, config.mm_per_px)?;
        debug!(
            width_mm = page.width_mm(),
            height_mm = page.height_mm(),
            width_px = page.width_px(),
            height_px = page.height_px(),
            "Page canvas"
        );

        let layout = LayoutSettings {
            font_size: config.font_size.round().max(1.0) as u32,
            ..LayoutSettings::default()
        };
        let tool = ToolSettings {
            feed_rate: config.feed_rate,
            safe_z: config.safe_z,
            cutting_z: config.cutting_z,
            ..ToolSettings::default()
        };
        let pipeline = Pipeline::new(
            page,
            layout,
            FontSearch::new(config.font_path.clone()),
            tool,
            config.output_dir.clone(),
        );
        Ok(if config.keep_preview {
            let dir = config
                .preview_dir
                .clone()
                .unwrap_or_else(|| config.output_dir.clone());
            pipeline.with_preview_dir(dir)
        } else {
            pipeline
        })
    }

    /// Skips font discovery and uses `typeface` for every batch.
    pub fn with_typeface(mut self, typeface: Typeface) -> Self {
        self.typeface = Some(typeface);
        self
    }

    /// Saves each rendered canvas as `preview_<stamp>.png` in `dir`.
    pub fn with_preview_dir(mut self, dir: PathBuf) -> Self {
        self.preview_dir = Some(dir);
        self
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Processes one batch, stamping its files with the current local time.
    pub fn process(&mut self, batch: &str) -> Result<BatchOutcome, PlotError> {
        let stamp = toolpath::timestamp(&Local::now());
        self.process_stamped(batch, &stamp)
    }

    pub fn process_stamped(&mut self, batch: &str, stamp: &str) -> Result<BatchOutcome, PlotError> {
        let font_size = self.layout.settings().font_size as f32;
        let search = &self.font_search;
        let typeface: &Typeface = self
            .typeface
            .get_or_insert_with(|| {
                let resolved = search.resolve(font_size);
                debug!(font = ?resolved.source(), "Typeface resolved");
                resolved
            });

        let placements = self.layout.place(batch, typeface);
        let page = *self.layout.page();
        debug!(
            words = placements.len(),
            cursor = ?self.layout.cursor(),
            "Batch laid out"
        );

        let canvas = raster::render(&page, &placements, typeface);

        // Preview failures are logged; the program is still written.
        let preview_path = self
            .preview_dir
            .as_deref()
            .and_then(|dir| match write_preview(&canvas, dir, stamp) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(dir = %dir.display(), "Preview not saved: {e}");
                    None
                }
            });

        let contours = contour::extract(&canvas, &self.contour_settings);
        let program =
            ToolpathProgram::from_contours(&contours, page.height_px(), page.mm_per_px(), &self.tool);
        let program_path = toolpath::write_program(&program, &self.output_dir, stamp)?;

        info!(
            words = placements.len(),
            contours = program.contour_count(),
            path = %program_path.display(),
            "Batch processed"
        );

        Ok(BatchOutcome {
            program_path,
            preview_path,
            words: placements.len(),
            contours: program.contour_count(),
        })
    }
}

fn write_preview(canvas: &RgbImage, dir: &Path, stamp: &str) -> Result<PathBuf, PlotError> {
    let (file, path) = writer::create_unique(dir, "preview", stamp, "png")?;
    drop(file);
    if let Err(e) = raster::save_preview(canvas, &path) {
        fs::remove_file(&path).ok();
        return Err(e);
    }
    Ok(path)
}
