mod config;
mod contour;
mod coordinator;
mod dispatch;
mod errors;
mod layout;
mod pipeline;
mod raster;
mod state;
mod toolpath;
mod transcription;
mod typeface;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::coordinator::{run_coordinator, CoordinatorSettings};
use crate::state::AppState;
use crate::transcription::{run_producer, Batcher, StdinTranscriber};

const SUPERVISOR_TICK: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting handplot v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Cannot create output directory {}", config.output_dir.display())
    })?;
    info!("Writing programs to {}", config.output_dir.display());
    if let (true, Some(dir)) = (config.keep_preview, &config.preview_dir) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create preview directory {}", dir.display()))?;
    }

    let state = AppState::new(config)?;
    let config = &state.config;
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();

    let transcriber = StdinTranscriber::spawn(config.listen_timeout)
        .context("Failed to start transcript reader")?;
    let producer = tokio::spawn(run_producer(
        transcriber,
        Batcher::new(config.batch_threshold),
        queue_tx,
        Arc::clone(&state.shutdown),
    ));

    let consumer = tokio::spawn(run_coordinator(
        Arc::clone(&state.pipeline),
        queue_rx,
        Arc::clone(&state.sender),
        Arc::clone(&state.shutdown),
        CoordinatorSettings {
            dispatch_delay: config.dispatch_delay,
            ..CoordinatorSettings::default()
        },
    ));

    info!("Speak (or type) to write; Ctrl+C stops");

    let mut ticker = tokio::time::interval(SUPERVISOR_TICK);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!("Cannot listen for Ctrl+C: {e}");
                }
                info!("Shutting down...");
                break;
            }
            _ = ticker.tick() => {
                if producer.is_finished() && consumer.is_finished() {
                    info!("Producer and coordinator finished");
                    break;
                }
            }
        }
    }

    state.shutdown.store(true, Ordering::SeqCst);
    // A batch already in flight finishes, including its dispatch delay.
    if let Err(e) = consumer.await {
        warn!("Coordinator task failed: {e}");
    }
    if !producer.is_finished() {
        producer.abort();
    }

    let cursor = state.pipeline.lock().await.layout().cursor();
    info!(x = cursor.x, y = cursor.y, "Stopped");
    Ok(())
}
