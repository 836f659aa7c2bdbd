use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::transcription::DEFAULT_BATCH_THRESHOLD;

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    /// Explicit path to the G-code sender. Falls back to the known install locations.
    pub sender_path: Option<PathBuf>,
    pub dispatch_enabled: bool,
    /// Explicit font file, tried before the handwriting font search.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    /// Canvas resolution; also the pixel -> machine millimetre scale.
    pub mm_per_px: f64,
    pub batch_threshold: usize,
    pub feed_rate: f64,
    pub safe_z: f64,
    pub cutting_z: f64,
    pub listen_timeout: Duration,
    pub dispatch_delay: Duration,
    pub keep_preview: bool,
    /// Directory for preview images; defaults to `output_dir`.
    pub preview_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            output_dir: optional_env("HANDPLOT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            sender_path: optional_env("HANDPLOT_SENDER_PATH").map(PathBuf::from),
            dispatch_enabled: parse_env("HANDPLOT_DISPATCH", true)?,
            font_path: optional_env("HANDPLOT_FONT_PATH").map(PathBuf::from),
            font_size: parse_env("HANDPLOT_FONT_SIZE", 200.0)?,
            mm_per_px: parse_env("HANDPLOT_MM_PER_PX", 0.08)?,
            batch_threshold: parse_env("HANDPLOT_BATCH_THRESHOLD", DEFAULT_BATCH_THRESHOLD)?,
            feed_rate: parse_env("HANDPLOT_FEED_RATE", 800.0)?,
            safe_z: parse_env("HANDPLOT_SAFE_Z", 5.0)?,
            cutting_z: parse_env("HANDPLOT_CUTTING_Z", -0.5)?,
            listen_timeout: Duration::from_secs(parse_env("HANDPLOT_LISTEN_TIMEOUT_SECS", 5)?),
            dispatch_delay: Duration::from_millis(parse_env("HANDPLOT_DISPATCH_DELAY_MS", 2000)?),
            keep_preview: parse_env("HANDPLOT_KEEP_PREVIEW", false)?,
            preview_dir: optional_env("HANDPLOT_PREVIEW_DIR").map(PathBuf::from),
            log_level: optional_env("HANDPLOT_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'"))
}
