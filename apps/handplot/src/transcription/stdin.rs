//! Line-based transcriber: every line on standard input is one recognized
//! fragment. Stands in for a streaming speech service (or sits behind one
//! that prints its transcript to a pipe).
//!
//! Reading happens on a dedicated OS thread feeding a channel, so a pending
//! read never holds up runtime shutdown.

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::transcription::{CaptureError, Recognition, Transcriber};

const LINE_BUFFER: usize = 64;

pub struct StdinTranscriber {
    lines: mpsc::Receiver<io::Result<String>>,
    window: Duration,
}

impl StdinTranscriber {
    /// Starts the reader thread over the process's standard input.
    pub fn spawn(window: Duration) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        thread::Builder::new()
            .name("stdin-transcript".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                debug!("Standard input reader finished");
            })?;
        Ok(Self::from_channel(rx, window))
    }

    /// Uses an existing line channel; closing the sender ends capture.
    pub fn from_channel(lines: mpsc::Receiver<io::Result<String>>, window: Duration) -> Self {
        StdinTranscriber { lines, window }
    }
}

#[async_trait]
impl Transcriber for StdinTranscriber {
    async fn listen(&mut self) -> Result<Recognition, CaptureError> {
        match tokio::time::timeout(self.window, self.lines.recv()).await {
            Err(_elapsed) => Ok(Recognition::Timeout),
            Ok(None) => Err(CaptureError("standard input closed".to_string())),
            Ok(Some(Err(e))) => Err(CaptureError(e.to_string())),
            Ok(Some(Ok(line))) => {
                let text = line.trim();
                if text.is_empty() {
                    Ok(Recognition::NoMatch)
                } else {
                    Ok(Recognition::Recognized(text.to_string()))
                }
            }
        }
    }
}
