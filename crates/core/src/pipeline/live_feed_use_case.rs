use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::detection::domain::detection::DetectionResult;
use crate::detection::domain::image_source::{ImageSource, SampleBuffer};
use crate::pipeline::detector::Detector;
use crate::pipeline::label_overlay::LabelOverlay;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::geometry::{Rect, Size};
use crate::shared::orientation::Orientation;
use crate::video::domain::capture_source::{frame_interval, CaptureSource};

const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Settings for one live-feed run.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Size of the preview the results are placed into.
    pub view_size: Size,
    /// Capture pacing in frames per second; 0 delivers samples as fast as
    /// the source produces them.
    pub frame_rate: f64,
    /// Threads calling the shared detector.
    pub workers: usize,
    pub cancelled: Arc<AtomicBool>,
}

impl FeedConfig {
    pub fn new(view_size: Size) -> Self {
        Self {
            view_size,
            frame_rate: 0.0,
            workers: 2,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Counters for a finished run. Every captured frame ends up in exactly one
/// of `detected`, `dropped` or `failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub captured: usize,
    /// Frames that went through the detector.
    pub detected: usize,
    /// Frames skipped because every worker or the detector was busy.
    pub dropped: usize,
    /// Frames lost to capture, conversion or engine errors.
    pub failed: usize,
    /// Results summed over all detected frames.
    pub results: usize,
}

enum FeedEvent {
    Detected {
        sequence: usize,
        results: Vec<DetectionResult>,
        duration_ms: f64,
    },
    Dropped,
    Failed,
}

/// Simulated camera preview: `capture → [workers → detector] → overlay`.
///
/// The capture thread never waits for detection. A frame is dropped when
/// no worker can take it, and a worker's call is dropped when the shared
/// detector is already running, so a slow model lowers the detection rate
/// instead of building a backlog.
pub struct LiveFeedUseCase {
    detector: Arc<Detector>,
    overlay: LabelOverlay,
    logger: Box<dyn PipelineLogger>,
    config: FeedConfig,
}

impl LiveFeedUseCase {
    pub fn new(detector: Arc<Detector>, logger: Box<dyn PipelineLogger>, config: FeedConfig) -> Self {
        Self {
            detector,
            overlay: LabelOverlay::new(),
            logger,
            config,
        }
    }

    pub fn overlay(&self) -> &LabelOverlay {
        &self.overlay
    }

    pub fn execute(
        &mut self,
        source: Box<dyn CaptureSource>,
    ) -> Result<FeedSummary, Box<dyn std::error::Error>> {
        let workers = self.config.workers.max(1);
        let orientation = source.orientation();

        let (sample_tx, sample_rx) = crossbeam_channel::bounded::<SampleBuffer>(workers);
        let (event_tx, event_rx) = crossbeam_channel::bounded::<FeedEvent>(DEFAULT_EVENT_CAPACITY);

        let capture_handle = spawn_capture(
            source,
            sample_tx,
            event_tx.clone(),
            self.config.frame_rate,
            self.config.cancelled.clone(),
        );
        let worker_handles: Vec<_> = (0..workers)
            .map(|_| {
                spawn_worker(
                    self.detector.clone(),
                    sample_rx.clone(),
                    event_tx.clone(),
                    orientation,
                    self.config.view_size,
                )
            })
            .collect();
        drop(sample_rx);
        drop(event_tx);

        let mut summary = self.run_main_loop(event_rx);

        summary.captured = capture_handle
            .join()
            .map_err(|_| "capture thread panicked")?;
        for handle in worker_handles {
            handle.join().map_err(|_| "detection worker panicked")?;
        }

        self.logger.summary();
        log::info!(
            "Feed finished: {} captured, {} detected, {} dropped, {} failed",
            summary.captured,
            summary.detected,
            summary.dropped,
            summary.failed
        );
        Ok(summary)
    }

    /// Consumes worker events until every sender is gone. Results older than
    /// the ones already on screen are counted but not shown.
    fn run_main_loop(&mut self, event_rx: Receiver<FeedEvent>) -> FeedSummary {
        let mut summary = FeedSummary::default();
        let mut shown: Option<usize> = None;

        for event in event_rx {
            match event {
                FeedEvent::Detected {
                    sequence,
                    results,
                    duration_ms,
                } => {
                    summary.detected += 1;
                    summary.results += results.len();
                    self.logger.timing("detect", duration_ms);
                    self.logger.metric("results", results.len() as f64);
                    if shown.map_or(true, |s| sequence > s) {
                        self.overlay.reconcile(&results);
                        shown = Some(sequence);
                    }
                }
                FeedEvent::Dropped => {
                    summary.dropped += 1;
                    self.logger.metric("dropped", 1.0);
                }
                FeedEvent::Failed => summary.failed += 1,
            }
            let handled = summary.detected + summary.dropped + summary.failed;
            self.logger.progress(handled, None);
        }
        summary
    }
}

/// Reads samples at the configured pace and hands them to idle workers.
/// Returns the number of samples captured.
fn spawn_capture(
    mut source: Box<dyn CaptureSource>,
    sample_tx: Sender<SampleBuffer>,
    event_tx: Sender<FeedEvent>,
    frame_rate: f64,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<usize> {
    std::thread::spawn(move || {
        let interval = frame_interval(frame_rate);
        let mut next_deadline = Instant::now();
        let mut captured = 0;

        while let Some(sample) = source.next_sample() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            captured += 1;

            let event = match sample {
                Ok(sample) => match sample_tx.try_send(sample) {
                    Ok(()) => None,
                    Err(TrySendError::Full(_)) => Some(FeedEvent::Dropped),
                    Err(TrySendError::Disconnected(_)) => break,
                },
                Err(e) => {
                    log::warn!("Capture failed: {e}");
                    Some(FeedEvent::Failed)
                }
            };
            if let Some(event) = event {
                if event_tx.send(event).is_err() {
                    break;
                }
            }

            if let Some(interval) = interval {
                next_deadline += interval;
                let now = Instant::now();
                if next_deadline > now {
                    std::thread::sleep(next_deadline - now);
                } else {
                    next_deadline = now;
                }
            }
        }
        captured
    })
}

fn spawn_worker(
    detector: Arc<Detector>,
    sample_rx: Receiver<SampleBuffer>,
    event_tx: Sender<FeedEvent>,
    orientation: Orientation,
    view_size: Size,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for sample in sample_rx {
            let sequence = sample.sequence();
            let source = ImageSource::SampleBuffer {
                buffer: sample,
                orientation,
            };
            let fit_frame = source
                .upright_size()
                .map(|size| Rect::aspect_fit(size, view_size))
                .unwrap_or_else(|| Rect::from_size(view_size));

            let start = Instant::now();
            let event = match detector.try_inference(&source, &fit_frame) {
                Ok(results) => FeedEvent::Detected {
                    sequence,
                    results,
                    duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                },
                Err(e) if e.is_dropped_frame() => FeedEvent::Dropped,
                Err(e) => {
                    if e.is_per_call_fault() {
                        log::warn!("Frame {sequence}: {e}");
                    }
                    FeedEvent::Failed
                }
            };
            if event_tx.send(event).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detect_error::InferError;
    use crate::detection::domain::detection::{Detection, LabelCandidate};
    use crate::detection::domain::detector_config::DetectorConfig;
    use crate::detection::domain::image_source::{PixelBuffer, PixelFormat};
    use crate::detection::domain::inference_engine::InferenceEngine;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::NormalizedRect;
    use crate::video::domain::capture_source::CaptureError;
    use std::time::Duration;

    /// Yields `count` 4x2 BGRA samples, optionally waiting on `gate`
    /// before every sample after the first.
    struct StubCapture {
        count: usize,
        next: usize,
        missing_image_at: Option<usize>,
        gate: Option<Receiver<()>>,
    }

    impl StubCapture {
        fn new(count: usize) -> Self {
            Self {
                count,
                next: 0,
                missing_image_at: None,
                gate: None,
            }
        }
    }

    impl CaptureSource for StubCapture {
        fn orientation(&self) -> Orientation {
            Orientation::Up
        }

        fn next_sample(&mut self) -> Option<Result<SampleBuffer, CaptureError>> {
            if self.next >= self.count {
                return None;
            }
            if self.next > 0 {
                if let Some(gate) = &self.gate {
                    gate.recv().ok()?;
                }
            }
            let sequence = self.next;
            self.next += 1;
            let buffer = (self.missing_image_at != Some(sequence)).then(|| {
                PixelBuffer::from_frame(&Frame::filled(4, 2, [1, 2, 3], sequence), PixelFormat::Bgra8)
            });
            Some(Ok(SampleBuffer::new(
                buffer,
                Duration::from_millis(33 * sequence as u64),
                sequence,
            )))
        }
    }

    struct StubEngine;

    impl InferenceEngine for StubEngine {
        fn infer(&mut self, _image: &Frame) -> Result<Vec<Detection>, InferError> {
            Ok(vec![Detection {
                bounding_box: NormalizedRect::new(0.0, 0.0, 0.5, 0.5),
                confidence: 0.8,
                labels: vec![LabelCandidate::new("car", 0.8)],
            }])
        }
    }

    /// Signals when the first call starts, then holds the engine for a while.
    struct SlowEngine {
        entered: Sender<()>,
        hold: Duration,
    }

    impl InferenceEngine for SlowEngine {
        fn infer(&mut self, _image: &Frame) -> Result<Vec<Detection>, InferError> {
            let _ = self.entered.try_send(());
            std::thread::sleep(self.hold);
            Ok(Vec::new())
        }
    }

    fn config(workers: usize) -> FeedConfig {
        FeedConfig {
            workers,
            ..FeedConfig::new(Size::new(80.0, 80.0))
        }
    }

    fn run(engine: Box<dyn InferenceEngine>, source: StubCapture, config: FeedConfig) -> (FeedSummary, usize) {
        let detector = Arc::new(Detector::new(engine, DetectorConfig::default()));
        let mut uc = LiveFeedUseCase::new(detector, Box::new(NullPipelineLogger), config);
        let summary = uc.execute(Box::new(source)).unwrap();
        (summary, uc.overlay().len())
    }

    #[test]
    fn test_every_captured_frame_is_accounted_for() {
        let (summary, _) = run(Box::new(StubEngine), StubCapture::new(20), config(2));
        assert_eq!(summary.captured, 20);
        assert_eq!(summary.detected + summary.dropped + summary.failed, 20);
        assert!(summary.detected >= 1);
        assert_eq!(summary.results, summary.detected);
    }

    #[test]
    fn test_overlay_shows_latest_results() {
        let (summary, labels) = run(Box::new(StubEngine), StubCapture::new(3), config(1));
        assert!(summary.detected >= 1);
        assert_eq!(labels, 1);
    }

    #[test]
    fn test_missing_image_buffer_counts_as_failed() {
        let mut source = StubCapture::new(1);
        source.missing_image_at = Some(0);
        let (summary, labels) = run(Box::new(StubEngine), source, config(1));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.detected, 0);
        assert_eq!(labels, 0);
    }

    #[test]
    fn test_busy_detector_drops_second_frame() {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let engine = SlowEngine {
            entered: entered_tx,
            hold: Duration::from_millis(300),
        };
        let mut source = StubCapture::new(2);
        source.gate = Some(entered_rx);

        let (summary, _) = run(Box::new(engine), source, config(2));
        assert_eq!(summary.captured, 2);
        assert_eq!(summary.detected, 1);
        assert_eq!(summary.dropped, 1);
    }

    #[test]
    fn test_unavailable_detector_fails_every_frame() {
        let detector = Arc::new(Detector::unavailable("no model", DetectorConfig::default()));
        let mut uc = LiveFeedUseCase::new(detector, Box::new(NullPipelineLogger), config(1));
        let summary = uc.execute(Box::new(StubCapture::new(2))).unwrap();
        assert_eq!(summary.captured, 2);
        assert_eq!(summary.detected, 0);
        assert_eq!(summary.dropped + summary.failed, 2);
    }

    #[test]
    fn test_cancelled_feed_captures_nothing() {
        let config = config(1);
        config.cancelled.store(true, Ordering::Relaxed);
        let (summary, _) = run(Box::new(StubEngine), StubCapture::new(5), config);
        assert_eq!(summary, FeedSummary::default());
    }
}
