//! Hand-off of finished programs to an external G-code sender.
//!
//! `Sender` is the seam the coordinator talks to. `UgsSender` drives a
//! Universal G-code Sender install through a `Launcher`, so tests can record
//! the command line instead of spawning processes.

pub mod ugs;

use std::path::Path;

use tracing::info;

use crate::errors::PlotError;

pub use ugs::{resolve_sender_path, UgsSender};

pub trait Sender: Send + Sync {
    /// Opens `program` in the sender. Must not wait for the sender to exit.
    fn dispatch(&self, program: &Path) -> Result<(), PlotError>;
}

/// Used when dispatch is switched off; programs are only written.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSender;

impl Sender for DisabledSender {
    fn dispatch(&self, program: &Path) -> Result<(), PlotError> {
        info!(path = %program.display(), "Dispatch disabled; program left on disk");
        Ok(())
    }
}
