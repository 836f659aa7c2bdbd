//! Consumer side of the batch queue.
//!
//! Each iteration takes the pipeline lock, then dequeues. A dequeued batch is
//! processed, dispatched, and followed by the post-dispatch delay, all under
//! that one guard. Nothing else may touch the cursor while a batch is in
//! flight, and the sender gets time to start before the next file lands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::dispatch::Sender;
use crate::pipeline::Pipeline;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub poll_interval: Duration,
    pub dispatch_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        CoordinatorSettings {
            poll_interval: DEFAULT_POLL_INTERVAL,
            dispatch_delay: DEFAULT_DISPATCH_DELAY,
        }
    }
}

/// Runs until `shutdown` is set, or until the queue is closed and drained.
pub async fn run_coordinator(
    pipeline: Arc<Mutex<Pipeline>>,
    mut queue: UnboundedReceiver<String>,
    sender: Arc<dyn Sender>,
    shutdown: Arc<AtomicBool>,
    settings: CoordinatorSettings,
) {
    info!("Batch coordinator started");
    while !shutdown.load(Ordering::SeqCst) {
        let guard = Arc::clone(&pipeline).lock_owned().await;

        let batch = match queue.try_recv() {
            Ok(batch) => batch,
            Err(TryRecvError::Empty) => {
                drop(guard);
                tokio::time::sleep(settings.poll_interval).await;
                continue;
            }
            Err(TryRecvError::Disconnected) => {
                info!("Batch queue closed");
                break;
            }
        };

        if batch.trim().is_empty() {
            debug!("Skipping blank batch");
            continue;
        }

        info!(words = batch.split_whitespace().count(), "Processing batch");
        let sender = Arc::clone(&sender);
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let outcome = guard.process(&batch);
            let dispatched = outcome
                .as_ref()
                .ok()
                .map(|done| sender.dispatch(&done.program_path));
            (guard, outcome, dispatched)
        })
        .await;

        let (guard, outcome, dispatched) = match joined {
            Ok(parts) => parts,
            Err(e) => {
                error!("Batch worker panicked: {e}");
                continue;
            }
        };

        if let Err(e) = outcome {
            error!("Error processing batch: {e}");
            continue;
        }

        match dispatched {
            Some(Ok(())) => {}
            Some(Err(e)) if e.is_degradation() => warn!("Program not dispatched: {e}"),
            Some(Err(e)) => error!("Dispatch failed: {e}"),
            None => {}
        }

        tokio::time::sleep(settings.dispatch_delay).await;
        drop(guard);
    }
    info!("Batch coordinator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    use crate::errors::PlotError;
    use crate::layout::{LayoutSettings, Page};
    use crate::toolpath::ToolSettings;
    use crate::typeface::fallback::BitmapFont;
    use crate::typeface::{FontSearch, Typeface};

    #[derive(Default)]
    struct RecordingSender {
        sent: StdMutex<Vec<PathBuf>>,
        unavailable: bool,
    }

    impl Sender for RecordingSender {
        fn dispatch(&self, program: &Path) -> Result<(), PlotError> {
            if self.unavailable {
                return Err(PlotError::SenderNotFound);
            }
            self.sent.lock().unwrap().push(program.to_path_buf());
            Ok(())
        }
    }

    fn quick() -> CoordinatorSettings {
        CoordinatorSettings {
            poll_interval: Duration::from_millis(5),
            dispatch_delay: Duration::from_millis(10),
        }
    }

    fn shared_pipeline(dir: &Path) -> Arc<Mutex<Pipeline>> {
        let pipeline = Pipeline::new(
            Page::a4(),
            LayoutSettings::default(),
            FontSearch::new(None),
            ToolSettings::default(),
            dir.to_path_buf(),
        )
        .with_typeface(Typeface::Bitmap(BitmapFont::for_size(200.0)));
        Arc::new(Mutex::new(pipeline))
    }

    fn nc_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "nc"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_default_settings() {
        let settings = CoordinatorSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert_eq!(settings.dispatch_delay, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_batches_are_processed_and_dispatched_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = shared_pipeline(dir.path());
        let sender = Arc::new(RecordingSender::default());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send("hello world".to_string()).unwrap();
        tx.send("   ".to_string()).unwrap();
        tx.send("second batch".to_string()).unwrap();
        drop(tx);

        run_coordinator(
            pipeline.clone(),
            rx,
            sender.clone(),
            Arc::new(AtomicBool::new(false)),
            quick(),
        )
        .await;

        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2, "blank batch is skipped");
        assert_ne!(sent[0], sent[1]);
        assert_eq!(nc_files(dir.path()).len(), 2);
        assert!(pipeline.lock().await.layout().cursor().x > 10);
    }

    #[tokio::test]
    async fn test_missing_sender_does_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(RecordingSender {
            unavailable: true,
            ..RecordingSender::default()
        });
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("one".to_string()).unwrap();
        tx.send("two".to_string()).unwrap();
        drop(tx);

        run_coordinator(
            shared_pipeline(dir.path()),
            rx,
            sender,
            Arc::new(AtomicBool::new(false)),
            quick(),
        )
        .await;

        assert_eq!(nc_files(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created");
        let sender = Arc::new(RecordingSender::default());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("lost words".to_string()).unwrap();
        drop(tx);

        run_coordinator(
            shared_pipeline(&missing),
            rx,
            sender.clone(),
            Arc::new(AtomicBool::new(false)),
            quick(),
        )
        .await;

        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_shutdown_flag_stops_before_dequeue() {
        let dir = tempfile::tempdir().unwrap();
        let sender = Arc::new(RecordingSender::default());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("never processed".to_string()).unwrap();

        run_coordinator(
            shared_pipeline(dir.path()),
            rx,
            sender.clone(),
            Arc::new(AtomicBool::new(true)),
            quick(),
        )
        .await;

        assert!(sender.sent.lock().unwrap().is_empty());
        assert!(nc_files(dir.path()).is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn test_held_pipeline_lock_blocks_processing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = shared_pipeline(dir.path());
        let sender = Arc::new(RecordingSender::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let held = pipeline.clone().lock_owned().await;
        let worker = tokio::spawn(run_coordinator(
            pipeline.clone(),
            rx,
            sender.clone(),
            Arc::new(AtomicBool::new(false)),
            quick(),
        ));

        tx.send("waiting".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(nc_files(dir.path()).is_empty());

        drop(held);
        drop(tx);
        worker.await.unwrap();
        assert_eq!(nc_files(dir.path()).len(), 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    /// 80 x 60 px page, so a batch renders and traces in a few milliseconds.
    fn small_pipeline(dir: &Path) -> Arc<Mutex<Pipeline>> {
        let settings = LayoutSettings {
            font_size: 8,
            word_spacing: 2,
            line_spacing: 2,
            left_margin: 1,
            origin: (1, 1),
        };
        let pipeline = Pipeline::new(
            Page::new(40.0, 30.0, 0.5).unwrap(),
            settings,
            FontSearch::new(None),
            ToolSettings::default(),
            dir.to_path_buf(),
        )
        .with_typeface(Typeface::Bitmap(BitmapFont::for_size(8.0)));
        Arc::new(Mutex::new(pipeline))
    }

    /// Yields (without moving the paused clock) until `count` dispatches land.
    async fn wait_for_dispatches(sender: &RecordingSender, count: usize) {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while sender.sent.lock().unwrap().len() < count {
            assert!(
                std::time::Instant::now() < deadline,
                "expected {count} dispatches"
            );
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_batch_waits_out_the_dispatch_delay_under_lock() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = small_pipeline(dir.path());
        let sender = Arc::new(RecordingSender::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("one".to_string()).unwrap();
        tx.send("two".to_string()).unwrap();

        let worker = tokio::spawn(run_coordinator(
            pipeline.clone(),
            rx,
            sender.clone(),
            shutdown.clone(),
            CoordinatorSettings {
                poll_interval: Duration::from_millis(100),
                dispatch_delay: Duration::from_secs(2),
            },
        ));

        wait_for_dispatches(&sender, 1).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(nc_files(dir.path()).len(), 1);
        assert!(
            pipeline.try_lock().is_err(),
            "pipeline stays locked through the delay"
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        wait_for_dispatches(&sender, 2).await;
        assert_eq!(nc_files(dir.path()).len(), 2);

        shutdown.store(true, Ordering::SeqCst);
        drop(tx);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_idle_is_observed() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let (_tx, rx) = mpsc::unbounded_channel::<String>();

        let worker = tokio::spawn(run_coordinator(
            shared_pipeline(dir.path()),
            rx,
            Arc::new(RecordingSender::default()),
            shutdown.clone(),
            quick(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("coordinator should stop")
            .unwrap();
    }
}
