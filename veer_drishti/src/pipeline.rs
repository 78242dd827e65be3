// THEORY:
// The `pipeline` module is the video half of the engine. A `DetectionPipeline` owns a
// frame source and a detector, samples the source at a fixed cadence on a background
// tokio task, and publishes the most recent non-empty detection set for any number of
// concurrent readers.
//
// Key architectural principles:
// 1.  **Single Writer, Snapshot Swap**: the published set is an `Arc<Vec<Detection>>`
//     behind a lock that is held only long enough to swap or clone the pointer. A
//     reader always gets a complete set and never waits on a detector run.
// 2.  **Stale Beats Empty**: an empty tick does not clear the snapshot. Consumers see
//     the last thing that was seen rather than nothing.
// 3.  **Infinite Feed**: end of stream rewinds the source and drops the previous frame,
//     so the motion heuristic never compares the last frame with the first.
// 4.  **Never Fatal**: a failed read or detector run is logged and counts as an empty
//     tick. A source that cannot be opened stops the loop, and queries keep serving
//     the last snapshot.
// 5.  **Owned Worker**: the loop owns the source, detector and previous frame, and
//     parks them back in shared state whenever it exits. A pipeline whose loop has
//     ended, whether stopped or failed to open its source, can be started again.

use crate::core_modules::detection::{Detection, Watchlist};
use crate::core_modules::detector::{ClassifierLoader, Detector, MotionConfig, select_detector};
use crate::core_modules::frame::Frame;
use crate::core_modules::frame_source::FrameSource;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Configuration for the DetectionPipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Time between two sampled frames.
    pub sample_interval: Duration,
    pub watchlist: Watchlist,
    pub motion: MotionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(1),
            watchlist: Watchlist::default(),
            motion: MotionConfig::default(),
        }
    }
}

/// What one tick produced.
#[derive(Debug)]
enum TickOutcome {
    Detections(Vec<Detection>),
    /// Nothing usable this tick: a failed read, a failed detector run, or an empty
    /// source after rewinding.
    Nothing,
}

/// The state owned by the background loop.
struct PipelineWorker {
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    previous: Option<Frame>,
}

impl PipelineWorker {
    fn tick(&mut self) -> TickOutcome {
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(source = %self.source.describe(), "End of stream, rewinding");
                self.source.rewind();
                self.previous = None;
                match self.source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => return TickOutcome::Nothing,
                    Err(e) => {
                        warn!(error = %e, "Frame read failed after rewind");
                        return TickOutcome::Nothing;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Frame read failed");
                return TickOutcome::Nothing;
            }
        };

        let result = self.detector.detect(&frame, self.previous.as_ref());
        self.previous = Some(frame);
        match result {
            Ok(detections) => TickOutcome::Detections(detections),
            Err(e) => {
                warn!(detector = %self.detector.name(), error = %e, "Detector failed");
                TickOutcome::Nothing
            }
        }
    }
}

/// State shared between the loop and readers.
struct Shared {
    snapshot: RwLock<Arc<Vec<Detection>>>,
    running: AtomicBool,
    ticks: AtomicU64,
    /// The worker while no loop owns it.
    parked: Mutex<Option<PipelineWorker>>,
}

impl Shared {
    fn new(worker: Option<PipelineWorker>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            parked: Mutex::new(worker),
        }
    }

    fn park(&self, worker: PipelineWorker) {
        *self.parked.lock().unwrap_or_else(PoisonError::into_inner) = Some(worker);
    }

    fn unpark(&self) -> Option<PipelineWorker> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn publish(&self, outcome: TickOutcome) {
        if let TickOutcome::Detections(detections) = outcome {
            if detections.is_empty() {
                return;
            }
            info!(count = detections.len(), "Detected threats");
            let next = Arc::new(detections);
            *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
        }
    }

    fn snapshot(&self) -> Arc<Vec<Detection>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

enum LoopState {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
}

/// The detection producer.
pub struct DetectionPipeline {
    shared: Arc<Shared>,
    sample_interval: Duration,
    strategy: String,
    state: Mutex<LoopState>,
}

impl DetectionPipeline {
    /// Builds a pipeline, picking the learned detector if `loader` succeeds and the
    /// motion heuristic otherwise.
    pub fn new(config: PipelineConfig, source: Box<dyn FrameSource>, loader: Option<ClassifierLoader>) -> Self {
        let detector = select_detector(loader, config.motion.clone(), config.watchlist.clone());
        Self::with_detector(config, source, detector)
    }

    pub fn with_detector(config: PipelineConfig, source: Box<dyn FrameSource>, detector: Box<dyn Detector>) -> Self {
        let strategy = detector.name().to_string();
        let worker = PipelineWorker {
            source,
            detector,
            previous: None,
        };
        Self {
            shared: Arc::new(Shared::new(Some(worker))),
            sample_interval: config.sample_interval,
            strategy,
            state: Mutex::new(LoopState::Idle),
        }
    }

    /// Spawns the sampling loop. Does nothing if it is already running. A loop that
    /// has exited on its own counts as idle. Must be called from within a tokio
    /// runtime.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let LoopState::Running { handle, .. } = &*state {
            if !handle.is_finished() {
                return;
            }
        }
        let Some(worker) = self.shared.unpark() else {
            error!("Detection pipeline lost its worker and cannot restart");
            return;
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        self.shared.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(run_loop(worker, self.shared.clone(), self.sample_interval, shutdown_rx));
        *state = LoopState::Running { shutdown, handle };
        info!(strategy = %self.strategy, "Detection pipeline started");
    }

    /// Signals the loop to exit and waits for it. Takes effect at the next tick
    /// boundary.
    pub async fn stop(&self) {
        let running = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, LoopState::Idle) {
                LoopState::Running { shutdown, handle } => Some((shutdown, handle)),
                idle => {
                    *state = idle;
                    None
                }
            }
        };
        let Some((shutdown, handle)) = running else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            error!(error = %e, "Detection loop terminated abnormally");
        }
        self.shared.running.store(false, Ordering::SeqCst);
        info!("Detection pipeline stopped");
    }

    /// A copy of the most recently published non-empty detection set.
    pub fn latest_detections(&self) -> Vec<Detection> {
        self.shared.snapshot().as_ref().clone()
    }

    /// Whether the sampling loop is live.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Name of the detector strategy selected at construction.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Number of ticks completed since construction.
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }
}

async fn run_loop(
    worker: PipelineWorker,
    shared: Arc<Shared>,
    sample_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // --- 1. Open the source ---
    let opened = tokio::task::spawn_blocking(move || {
        let mut worker = worker;
        let result = worker.source.open();
        (worker, result)
    })
    .await;
    let mut worker = match opened {
        Ok((worker, Ok(()))) => {
            info!(source = %worker.source.describe(), "Frame source opened");
            worker
        }
        Ok((worker, Err(e))) => {
            error!(source = %worker.source.describe(), error = %e, "Could not open frame source");
            shared.park(worker);
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
        Err(e) => {
            error!(error = %e, "Frame source open panicked");
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    };

    // --- 2. Sample until told to stop ---
    let mut ticker = tokio::time::interval(sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let ticked = tokio::task::spawn_blocking(move || {
            let mut worker = worker;
            let outcome = worker.tick();
            (worker, outcome)
        })
        .await;
        match ticked {
            Ok((returned, outcome)) => {
                worker = returned;
                shared.publish(outcome);
                shared.ticks.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                error!(error = %e, "Detection tick panicked, loop exiting");
                shared.running.store(false, Ordering::SeqCst);
                return;
            }
        }
    }

    shared.park(worker);
}
