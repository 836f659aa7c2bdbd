//! Transcription producer: turns recognized speech into text batches.
//!
//! # Architecture
//! - `Transcriber` is the capability seam to the speech service. Each `listen`
//!   call is bounded by the service's own timeout and reports a tagged
//!   `Recognition` instead of errors for the ordinary outcomes.
//! - `Batcher` accumulates fragments and decides when a batch is flushed.
//! - `run_producer` is the task loop: listen, batch, enqueue, until shutdown
//!   or until the capture source dies.

pub mod stdin;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

pub use stdin::StdinTranscriber;

/// Outcome of one listen window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Recognized(String),
    /// Audio was heard but nothing intelligible came out of it.
    NoMatch,
    /// The listen window elapsed without speech.
    Timeout,
    /// The recognition service failed for this window.
    BackendError(String),
}

/// The capture source itself is gone; the producer cannot continue.
#[derive(Debug, Error)]
#[error("Audio capture failed: {0}")]
pub struct CaptureError(pub String);

#[async_trait]
pub trait Transcriber: Send {
    async fn listen(&mut self) -> Result<Recognition, CaptureError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Batching
// ────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_BATCH_THRESHOLD: usize = 20;

/// Accumulates recognized text until a word-count threshold or a pause.
#[derive(Debug, Clone)]
pub struct Batcher {
    threshold: usize,
    pending: String,
}

impl Batcher {
    pub fn new(threshold: usize) -> Self {
        Batcher {
            threshold: threshold.max(1),
            pending: String::new(),
        }
    }

    pub fn pending_words(&self) -> usize {
        self.pending.split_whitespace().count()
    }

    /// Adds a fragment; returns a batch once the threshold is reached.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return None;
        }
        if !self.pending.is_empty() {
            self.pending.push(' ');
        }
        self.pending.push_str(fragment);

        if self.pending_words() >= self.threshold {
            self.take()
        } else {
            None
        }
    }

    /// Returns whatever is pending, regardless of the threshold.
    pub fn flush(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        let batch = std::mem::take(&mut self.pending);
        let batch = batch.trim();
        (!batch.is_empty()).then(|| batch.to_string())
    }

    /// Applies one listen outcome; returns a batch ready for the queue, if any.
    pub fn apply(&mut self, recognition: Recognition) -> Option<String> {
        match recognition {
            Recognition::Recognized(text) => {
                info!(text = %text.trim(), "Recognized");
                self.push(&text)
            }
            Recognition::Timeout => self.flush(),
            Recognition::NoMatch => {
                warn!("Could not understand audio");
                None
            }
            Recognition::BackendError(detail) => {
                warn!("Speech recognition error: {detail}");
                None
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Producer task
// ────────────────────────────────────────────────────────────────────────────

/// Listens until `shutdown` is set or capture fails; sends every flushed batch.
/// Text still pending when capture fails is sent as a final batch.
pub async fn run_producer<T: Transcriber>(
    mut transcriber: T,
    mut batcher: Batcher,
    queue: UnboundedSender<String>,
    shutdown: Arc<AtomicBool>,
) {
    info!("Listening...");
    while !shutdown.load(Ordering::SeqCst) {
        let recognition = match transcriber.listen().await {
            Ok(recognition) => recognition,
            Err(e) => {
                warn!("Error in transcription: {e}; producer stopping");
                if let Some(batch) = batcher.flush() {
                    if queue.send(batch).is_err() {
                        warn!("Batch queue closed; final batch dropped");
                    }
                }
                break;
            }
        };

        if let Some(batch) = batcher.apply(recognition) {
            if queue.send(batch).is_err() {
                warn!("Batch queue closed; producer stopping");
                break;
            }
        }
    }
    info!("Producer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    /// Replays a fixed script, then reports a capture failure.
    struct ScriptedTranscriber {
        script: VecDeque<Recognition>,
    }

    impl ScriptedTranscriber {
        fn new(script: Vec<Recognition>) -> Self {
            ScriptedTranscriber {
                script: script.into(),
            }
        }
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn listen(&mut self) -> Result<Recognition, CaptureError> {
            self.script
                .pop_front()
                .ok_or_else(|| CaptureError("script exhausted".to_string()))
        }
    }

    fn recognized(text: &str) -> Recognition {
        Recognition::Recognized(text.to_string())
    }

    #[test]
    fn test_batcher_flushes_at_threshold() {
        let mut batcher = Batcher::new(4);
        assert_eq!(batcher.push("one two"), None);
        assert_eq!(batcher.push("three four five"), Some("one two three four five".to_string()));
        assert_eq!(batcher.pending_words(), 0);
    }

    #[test]
    fn test_batcher_timeout_flushes_partial_text() {
        let mut batcher = Batcher::new(20);
        assert_eq!(batcher.apply(recognized("  hello  ")), None);
        assert_eq!(batcher.apply(Recognition::Timeout), Some("hello".to_string()));
        assert_eq!(batcher.apply(Recognition::Timeout), None, "nothing left to flush");
    }

    #[test]
    fn test_batcher_ignores_no_match_and_backend_errors() {
        let mut batcher = Batcher::new(2);
        assert_eq!(batcher.apply(Recognition::NoMatch), None);
        assert_eq!(
            batcher.apply(Recognition::BackendError("503".to_string())),
            None
        );
        assert_eq!(batcher.pending_words(), 0);
    }

    #[test]
    fn test_batcher_skips_blank_fragments() {
        let mut batcher = Batcher::new(1);
        assert_eq!(batcher.push("   "), None);
        assert_eq!(batcher.flush(), None);
    }

    #[tokio::test]
    async fn test_producer_enqueues_batches_then_stops_on_capture_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let transcriber = ScriptedTranscriber::new(vec![
            recognized("the quick"),
            Recognition::NoMatch,
            recognized("brown fox"),
            Recognition::Timeout,
            Recognition::BackendError("service unavailable".to_string()),
            recognized("jumps over the lazy dog"),
        ]);

        run_producer(transcriber, Batcher::new(4), tx, shutdown.clone()).await;

        assert_eq!(rx.recv().await, Some("the quick brown fox".to_string()));
        assert_eq!(rx.recv().await, Some("jumps over the lazy dog".to_string()));
        // Sender dropped when the producer returned.
        assert_eq!(rx.recv().await, None);
        assert!(!shutdown.load(Ordering::SeqCst), "capture failure stops only the producer");
    }

    #[tokio::test]
    async fn test_pending_text_is_flushed_when_capture_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transcriber = ScriptedTranscriber::new(vec![recognized("hello world")]);

        run_producer(
            transcriber,
            Batcher::new(DEFAULT_BATCH_THRESHOLD),
            tx,
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        assert_eq!(rx.recv().await, Some("hello world".to_string()));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_producer_observes_shutdown_flag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(true));
        let transcriber = ScriptedTranscriber::new(vec![recognized("never heard")]);

        run_producer(transcriber, Batcher::new(1), tx, shutdown).await;
        assert_eq!(rx.recv().await, None);
    }
}
