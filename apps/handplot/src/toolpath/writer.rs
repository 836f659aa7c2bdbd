//! Writes programs to uniquely named `.nc` files.
//!
//! Names are `output_<YYYYMMDD_HHMMSS>.nc`. When a name taken in the same
//! second already exists, `_1`, `_2`, ... is appended; every file is opened
//! with `create_new`, so two writers can never share one.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::errors::PlotError;
use crate::toolpath::program::ToolpathProgram;

const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Timestamp component shared by a program and its preview image.
pub fn timestamp(now: &DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Creates `<dir>/<stem>_<stamp>[_n].<ext>`, returning the open file and its path.
pub fn create_unique(
    dir: &Path,
    stem: &str,
    stamp: &str,
    ext: &str,
) -> Result<(File, PathBuf), PlotError> {
    for n in 0..MAX_COLLISION_SUFFIX {
        let name = if n == 0 {
            format!("{stem}_{stamp}.{ext}")
        } else {
            format!("{stem}_{stamp}_{n}.{ext}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(PlotError::Io(e)),
        }
    }
    Err(PlotError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for {stem}_{stamp}.{ext} in {}", dir.display()),
    )))
}

/// Writes `program` as `output_<stamp>.nc` in `dir` and returns the path.
pub fn write_program(
    program: &ToolpathProgram,
    dir: &Path,
    stamp: &str,
) -> Result<PathBuf, PlotError> {
    let (mut file, path) = create_unique(dir, "output", stamp, "nc")?;
    file.write_all(program.to_gcode().as_bytes())?;
    file.flush()?;
    info!(
        path = %path.display(),
        contours = program.contour_count(),
        "G-code saved"
    );
    Ok(path)
}
