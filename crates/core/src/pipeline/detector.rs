use std::path::{Path, PathBuf};

use crate::detection::domain::detect_error::DetectError;
use crate::detection::domain::detection::DetectionResult;
use crate::detection::domain::detector_config::{DetectorConfig, SharedThresholds};
use crate::detection::domain::image_source::ImageSource;
use crate::detection::domain::inference_engine::InferenceEngine;
use crate::detection::infrastructure::execution_provider::ExecutionTarget;
use crate::detection::infrastructure::inference_gate::InferenceGate;
use crate::detection::infrastructure::model_resolver::{self, ProgressFn};
use crate::detection::infrastructure::onnx_yolo_engine::OnnxYoloEngine;
use crate::shared::geometry::Rect;

use super::inference_adapter::run_inference;

/// Where to find the model and how to run it.
#[derive(Clone, Debug)]
pub struct ModelSpec {
    /// File name of the ONNX model.
    pub name: String,
    pub bundle_dir: Option<PathBuf>,
    /// Fetched into the cache when the model is neither bundled nor cached.
    pub download_url: Option<String>,
    pub class_names: Vec<String>,
    pub target: ExecutionTarget,
}

enum EngineState {
    Ready(InferenceGate<Box<dyn InferenceEngine>>),
    Unavailable(String),
}

/// The single entry point for object detection.
///
/// Owns one engine behind an [`InferenceGate`], so a call that arrives while
/// another is running returns empty instead of waiting. Thresholds can be
/// changed through `&self` and apply from the next call on. A detector whose
/// model failed to load stays usable and returns nothing.
///
/// `Detector` is `Send + Sync`; share it with `Arc` across capture threads.
pub struct Detector {
    state: EngineState,
    thresholds: SharedThresholds,
}

impl Detector {
    pub fn new(engine: Box<dyn InferenceEngine>, config: DetectorConfig) -> Self {
        Self {
            state: EngineState::Ready(InferenceGate::new(engine)),
            thresholds: SharedThresholds::new(config),
        }
    }

    /// A detector that never runs inference.
    pub fn unavailable(reason: impl Into<String>, config: DetectorConfig) -> Self {
        let reason = reason.into();
        log::error!("Detector unavailable: {reason}");
        Self {
            state: EngineState::Unavailable(reason),
            thresholds: SharedThresholds::new(config),
        }
    }

    /// Loads an ONNX model from `model_path`, degrading to an unavailable
    /// detector if the session cannot be created.
    pub fn load(
        model_path: &Path,
        class_names: Vec<String>,
        target: ExecutionTarget,
        config: DetectorConfig,
    ) -> Self {
        match OnnxYoloEngine::new(model_path, class_names, target) {
            Ok(engine) => Self::new(Box::new(engine), config),
            Err(e) => Self::unavailable(
                format!("failed to load {}: {e}", model_path.display()),
                config,
            ),
        }
    }

    /// Resolves `spec` (bundle, cache, then download) and loads it.
    pub fn from_bundle(
        spec: &ModelSpec,
        config: DetectorConfig,
        progress: Option<ProgressFn>,
    ) -> Self {
        match model_resolver::resolve(
            &spec.name,
            spec.bundle_dir.as_deref(),
            spec.download_url.as_deref(),
            progress,
        ) {
            Ok(path) => Self::load(&path, spec.class_names.clone(), spec.target, config),
            Err(e) => Self::unavailable(e.to_string(), config),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            EngineState::Ready(_) => None,
            EngineState::Unavailable(reason) => Some(reason),
        }
    }

    /// True while an inference call holds the engine.
    pub fn is_busy(&self) -> bool {
        match &self.state {
            EngineState::Ready(gate) => gate.is_busy(),
            EngineState::Unavailable(_) => false,
        }
    }

    pub fn config(&self) -> DetectorConfig {
        self.thresholds.snapshot()
    }

    pub fn set_config(&self, config: DetectorConfig) {
        self.thresholds.replace(config);
    }

    pub fn set_label_confidence_threshold(&self, value: f32) {
        self.thresholds.set_label_confidence_threshold(value);
    }

    pub fn set_result_confidence_threshold(&self, value: f32) {
        self.thresholds.set_result_confidence_threshold(value);
    }

    /// Like [`Detector::inference`], but reports why a call produced nothing.
    pub fn try_inference(
        &self,
        source: &ImageSource,
        fit_frame: &Rect,
    ) -> Result<Vec<DetectionResult>, DetectError> {
        let gate = match &self.state {
            EngineState::Ready(gate) => gate,
            EngineState::Unavailable(reason) => {
                return Err(DetectError::ModelUnavailable(reason.clone()))
            }
        };
        gate.try_run(|engine| {
            let config = self.thresholds.snapshot();
            run_inference(engine.as_mut(), source, fit_frame, &config)
        })
        .unwrap_or(Err(DetectError::Busy))
    }

    /// Detects objects in `source` and places them inside `fit_frame`.
    ///
    /// Never fails: an unavailable model, a busy detector, unconvertible
    /// input or an engine error all yield an empty sequence. Engine and
    /// input errors are logged as warnings.
    pub fn inference(&self, source: &ImageSource, fit_frame: &Rect) -> Vec<DetectionResult> {
        match self.try_inference(source, fit_frame) {
            Ok(results) => results,
            Err(e) if e.is_dropped_frame() => {
                log::trace!("Inference in flight, dropping frame");
                Vec::new()
            }
            Err(e) => {
                if e.is_per_call_fault() {
                    log::warn!("Inference failed: {e}");
                }
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detect_error::InferError;
    use crate::detection::domain::detection::{Detection, LabelCandidate};
    use crate::detection::domain::image_source::StillImage;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::NormalizedRect;
    use crossbeam_channel::{Receiver, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn detection(confidence: f32, label: f32) -> Detection {
        Detection {
            bounding_box: NormalizedRect::new(0.25, 0.25, 0.5, 0.5),
            confidence,
            labels: vec![LabelCandidate::new("person", label)],
        }
    }

    struct ScriptedEngine {
        detections: Vec<Detection>,
        calls: Arc<AtomicUsize>,
    }

    impl InferenceEngine for ScriptedEngine {
        fn infer(&mut self, _image: &Frame) -> Result<Vec<Detection>, InferError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.detections.clone())
        }
    }

    /// Fails on the first call only.
    struct FlakyEngine {
        failed: bool,
    }

    impl InferenceEngine for FlakyEngine {
        fn infer(&mut self, _image: &Frame) -> Result<Vec<Detection>, InferError> {
            if !self.failed {
                self.failed = true;
                return Err("transient engine fault".into());
            }
            Ok(vec![detection(0.9, 0.9)])
        }
    }

    /// Signals on entry, then blocks until released.
    struct BlockingEngine {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl InferenceEngine for BlockingEngine {
        fn infer(&mut self, _image: &Frame) -> Result<Vec<Detection>, InferError> {
            self.entered.send(()).map_err(|e| e.to_string())?;
            self.release.recv().map_err(|e| e.to_string())?;
            Ok(vec![detection(0.9, 0.9)])
        }
    }

    fn scripted(detections: Vec<Detection>) -> (Detector, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = ScriptedEngine {
            detections,
            calls: calls.clone(),
        };
        (
            Detector::new(Box::new(engine), DetectorConfig::default()),
            calls,
        )
    }

    fn source() -> ImageSource {
        ImageSource::StillImage(StillImage::new(image::DynamicImage::ImageRgb8(
            image::RgbImage::new(8, 8),
        )))
    }

    fn fit() -> Rect {
        Rect::new(100.0, 50.0, 200.0, 200.0)
    }

    #[test]
    fn test_inference_maps_and_filters() {
        let (detector, calls) = scripted(vec![detection(0.9, 0.8), detection(0.2, 0.8)]);
        let results = detector.inference(&source(), &fit());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bounding_box, Rect::new(150.0, 100.0, 100.0, 100.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!detector.is_busy());
    }

    #[test]
    fn test_threshold_change_applies_to_next_call() {
        let (detector, _) = scripted(vec![detection(0.5, 0.5)]);
        assert_eq!(detector.inference(&source(), &fit()).len(), 1);

        detector.set_result_confidence_threshold(0.6);
        assert!(detector.inference(&source(), &fit()).is_empty());

        detector.set_config(DetectorConfig::default());
        detector.set_label_confidence_threshold(0.7);
        assert!(detector.inference(&source(), &fit()).is_empty());
        assert_eq!(detector.config().label_confidence_threshold, 0.7);
    }

    #[test]
    fn test_engine_failure_is_transient() {
        let detector = Detector::new(Box::new(FlakyEngine { failed: false }), DetectorConfig::default());
        assert!(matches!(
            detector.try_inference(&source(), &fit()),
            Err(DetectError::InferenceEngine(_))
        ));
        assert_eq!(detector.inference(&source(), &fit()).len(), 1);
    }

    #[test]
    fn test_unconvertible_input_yields_empty() {
        let (detector, calls) = scripted(vec![detection(0.9, 0.9)]);
        let empty = ImageSource::StillImage(StillImage::new(image::DynamicImage::ImageRgb8(
            image::RgbImage::new(0, 0),
        )));
        assert!(detector.inference(&empty, &fit()).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_oversized_buffer_geometry_yields_empty() {
        use crate::detection::domain::image_source::{PixelBuffer, PixelFormat};
        use crate::shared::orientation::Orientation;

        let (detector, calls) = scripted(vec![detection(0.9, 0.9)]);
        let source = ImageSource::PixelBuffer {
            buffer: PixelBuffer::with_stride(vec![0; 12], 1, 3, usize::MAX / 2 + 1, PixelFormat::Rgba8),
            orientation: Orientation::Up,
        };
        assert!(matches!(
            detector.try_inference(&source, &fit()),
            Err(DetectError::InvalidBuffer(_))
        ));
        assert!(detector.inference(&source, &fit()).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unavailable_detector_returns_empty_forever() {
        let detector = Detector::unavailable("no model", DetectorConfig::default());
        assert!(!detector.is_available());
        assert_eq!(detector.unavailable_reason(), Some("no model"));
        for _ in 0..3 {
            assert!(detector.inference(&source(), &fit()).is_empty());
        }
        assert!(matches!(
            detector.try_inference(&source(), &fit()),
            Err(DetectError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_load_missing_model_degrades() {
        let detector = Detector::load(
            Path::new("/nonexistent/yolov5s.onnx"),
            Vec::new(),
            ExecutionTarget::Cpu,
            DetectorConfig::default(),
        );
        assert!(!detector.is_available());
        assert!(detector.inference(&source(), &fit()).is_empty());
    }

    #[test]
    fn test_from_bundle_without_model_degrades() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = ModelSpec {
            name: "missing-model-for-test.onnx".to_string(),
            bundle_dir: Some(tmp.path().to_path_buf()),
            download_url: None,
            class_names: Vec::new(),
            target: ExecutionTarget::Cpu,
        };
        let detector = Detector::from_bundle(&spec, DetectorConfig::default(), None);
        assert!(!detector.is_available());
        assert!(detector
            .unavailable_reason()
            .is_some_and(|r| r.contains("missing-model-for-test.onnx")));
    }

    #[test]
    fn test_overlapping_call_is_dropped_without_blocking() {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(0);
        let (release_tx, release_rx) = crossbeam_channel::bounded(0);
        let detector = Arc::new(Detector::new(
            Box::new(BlockingEngine {
                entered: entered_tx,
                release: release_rx,
            }),
            DetectorConfig::default(),
        ));

        let first = {
            let detector = detector.clone();
            thread::spawn(move || detector.inference(&source(), &fit()))
        };
        entered_rx.recv().unwrap();
        assert!(detector.is_busy());

        let start = Instant::now();
        assert!(detector.inference(&source(), &fit()).is_empty());
        assert!(matches!(
            detector.try_inference(&source(), &fit()),
            Err(DetectError::Busy)
        ));
        assert!(start.elapsed() < Duration::from_secs(1));

        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap().len(), 1);
        assert!(!detector.is_busy());
    }

    #[test]
    fn test_detector_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Detector>();
    }
}
