use std::path::PathBuf;

use thiserror::Error;

/// Application-level error type.
/// Every pipeline stage and the dispatcher return `Result<T, PlotError>`; the
/// coordinator logs these and keeps going.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Invalid page geometry: {0}")]
    InvalidPage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Font error: {0}")]
    Font(String),

    #[error("No G-code sender program could be resolved")]
    SenderNotFound,

    #[error("G-code file not found: {}", .0.display())]
    ProgramMissing(PathBuf),

    #[error("Failed to launch sender: {0}")]
    Launch(String),
}

impl PlotError {
    /// True for failures that only degrade output (missing collaborators),
    /// as opposed to a broken pipeline stage.
    pub fn is_degradation(&self) -> bool {
        matches!(self, PlotError::SenderNotFound | PlotError::Font(_))
    }
}
