//! Font discovery: finds a handwriting face on the local machine.
//!
//! Search order:
//! 1. an explicit font file (`HANDPLOT_FONT_PATH`), if configured
//! 2. each handwriting face, in each font directory (directory order outer)
//! 3. each generic sans-serif face, in each font directory
//! 4. the embedded bitmap font
//!
//! A missing or unparsable file is never fatal; the search just moves on.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use tracing::{debug, info, warn};

use crate::errors::PlotError;
use crate::typeface::fallback::BitmapFont;
use crate::typeface::Typeface;

/// Handwriting-style faces, most preferred first.
pub const HANDWRITING_FACES: &[&str] = &["DancingScript-Regular.ttf", "Pacifico.ttf", "Gabriola.ttf"];
/// Generic faces tried once no handwriting face is installed.
pub const GENERIC_FACES: &[&str] = &["arial.ttf", "DejaVuSans.ttf"];

/// How many directory levels below a font directory are searched.
/// Linux distributions keep faces in per-family subfolders of `/usr/share/fonts`.
const MAX_SEARCH_DEPTH: usize = 2;

/// Platform font directories, in search order.
pub fn default_font_dirs() -> Vec<PathBuf> {
    let mut font_dirs = vec![
        PathBuf::from(r"C:\Windows\Fonts"),
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
    ];
    if let Some(home) = dirs::home_dir() {
        font_dirs.push(home.join(".fonts"));
    }
    font_dirs
}

/// A configured font search.
#[derive(Debug, Clone)]
pub struct FontSearch {
    pub explicit: Option<PathBuf>,
    pub dirs: Vec<PathBuf>,
    pub handwriting: Vec<&'static str>,
    pub generic: Vec<&'static str>,
}

impl FontSearch {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        FontSearch {
            explicit,
            dirs: default_font_dirs(),
            handwriting: HANDWRITING_FACES.to_vec(),
            generic: GENERIC_FACES.to_vec(),
        }
    }

    /// Every existing candidate file, in the order they will be tried.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        if let Some(explicit) = &self.explicit {
            if explicit.is_file() {
                found.push(explicit.clone());
            } else {
                warn!(path = %explicit.display(), "Configured font file does not exist");
            }
        }
        for faces in [&self.handwriting, &self.generic] {
            for dir in self.dirs.iter().filter(|d| d.is_dir()) {
                for face in faces {
                    if let Some(path) = find_face(dir, face, MAX_SEARCH_DEPTH) {
                        found.push(path);
                    }
                }
            }
        }
        found
    }

    /// Resolves a typeface at `font_size` pixels, degrading to the bitmap font.
    pub fn resolve(&self, font_size: f32) -> Typeface {
        for path in self.candidates() {
            match load_font(&path) {
                Ok(font) => {
                    info!(path = %path.display(), "Using font");
                    return Typeface::outline(font, font_size, path);
                }
                Err(e) => debug!(path = %path.display(), "Skipping font: {e}"),
            }
        }
        let bitmap = BitmapFont::for_size(font_size);
        warn!(
            dot = bitmap.dot(),
            "No font file could be loaded; using embedded bitmap font, text quality may be reduced"
        );
        Typeface::Bitmap(bitmap)
    }
}

/// Reads and parses a TrueType/OpenType file.
pub fn load_font(path: &Path) -> Result<FontArc, PlotError> {
    let bytes = fs::read(path)?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| PlotError::Font(format!("{}: {e}", path.display())))
}

/// Looks for `face` directly in `dir`, then in its subdirectories up to `depth` levels.
fn find_face(dir: &Path, face: &str, depth: usize) -> Option<PathBuf> {
    let direct = dir.join(face);
    if direct.is_file() {
        return Some(direct);
    }
    if depth == 0 {
        return None;
    }

    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    // read_dir order is platform-defined.
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_face(sub, face, depth - 1))
}
