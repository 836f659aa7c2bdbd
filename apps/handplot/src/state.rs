use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::dispatch::{resolve_sender_path, DisabledSender, Sender, UgsSender};
use crate::errors::PlotError;
use crate::pipeline::Pipeline;

/// Shared application state handed to the producer and coordinator tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Layout cursor and typeface live here; the lock serializes batches.
    pub pipeline: Arc<Mutex<Pipeline>>,
    pub sender: Arc<dyn Sender>,
    pub shutdown: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, PlotError> {
        let pipeline = Pipeline::from_config(&config)?;
        let sender = build_sender(&config);
        Ok(AppState {
            config,
            pipeline: Arc::new(Mutex::new(pipeline)),
            sender,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }
}

fn build_sender(config: &Config) -> Arc<dyn Sender> {
    if !config.dispatch_enabled {
        tracing::info!("Dispatch disabled (HANDPLOT_DISPATCH=false)");
        return Arc::new(DisabledSender);
    }
    match resolve_sender_path(config.sender_path.as_deref()) {
        Some(path) => {
            tracing::info!("G-code sender: {}", path.display());
            Arc::new(UgsSender::new(Some(path)))
        }
        None => {
            tracing::warn!("No G-code sender found; programs will be written but not sent");
            Arc::new(UgsSender::new(None))
        }
    }
}
