use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::detection::DetectionResult;
use crate::detection::domain::image_source::ImageSource;
use crate::pipeline::detector::Detector;
use crate::pipeline::label_overlay::{LabelOverlay, OverlayLabel};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::geometry::{Rect, Size};
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::infrastructure::annotated_image_renderer::render_annotated;

/// What a single-image run produced.
#[derive(Clone, Debug)]
pub struct DetectImageOutcome {
    pub image_size: Size,
    pub view_size: Size,
    /// Where the image sits inside the view.
    pub fit_frame: Rect,
    pub results: Vec<DetectionResult>,
    pub labels: Vec<OverlayLabel>,
}

/// Single-image pipeline: read → fit → detect → overlay → (render → write).
pub struct DetectImageUseCase {
    reader: Box<dyn ImageReader>,
    image_writer: Box<dyn ImageWriter>,
    detector: Arc<Detector>,
    overlay: LabelOverlay,
    logger: Box<dyn PipelineLogger>,
}

impl DetectImageUseCase {
    pub fn new(
        reader: Box<dyn ImageReader>,
        image_writer: Box<dyn ImageWriter>,
        detector: Arc<Detector>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            image_writer,
            detector,
            overlay: LabelOverlay::new(),
            logger,
        }
    }

    /// Detects objects in the image at `input_path` as if it were shown
    /// aspect-fit in a view of `view_size` (the image's own size if `None`).
    ///
    /// When `annotated_path` is given, the view is rendered with box
    /// outlines and written there.
    pub fn execute(
        &mut self,
        input_path: &Path,
        view_size: Option<Size>,
        annotated_path: Option<&Path>,
    ) -> Result<DetectImageOutcome, Box<dyn std::error::Error>> {
        let still = self.reader.read(input_path)?;
        let image_size = still.size();
        let view_size = view_size.unwrap_or(image_size);
        let fit_frame = Rect::aspect_fit(image_size, view_size);
        let source = ImageSource::StillImage(still);

        let start = Instant::now();
        let results = self.detector.inference(&source, &fit_frame);
        self.logger
            .timing("detect", start.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("results", results.len() as f64);
        self.logger.progress(1, Some(1));

        let stats = self.overlay.reconcile(&results);
        log::debug!(
            "Overlay: {} labels ({} created, {} removed)",
            self.overlay.len(),
            stats.created,
            stats.removed
        );

        if let Some(path) = annotated_path {
            let frame = source.to_upright_frame()?;
            let annotated = render_annotated(&frame, view_size, self.overlay.labels());
            self.image_writer.write(path, &annotated)?;
            self.logger
                .info(&format!("Annotated image written to {}", path.display()));
        }

        Ok(DetectImageOutcome {
            image_size,
            view_size,
            fit_frame,
            results,
            labels: self.overlay.labels().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detect_error::InferError;
    use crate::detection::domain::detection::{Detection, LabelCandidate};
    use crate::detection::domain::detector_config::DetectorConfig;
    use crate::detection::domain::image_source::StillImage;
    use crate::detection::domain::inference_engine::InferenceEngine;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::NormalizedRect;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct StubImageReader {
        width: u32,
        height: u32,
    }

    impl ImageReader for StubImageReader {
        fn read(&self, _path: &Path) -> Result<StillImage, Box<dyn std::error::Error>> {
            Ok(StillImage::new(image::DynamicImage::ImageRgb8(
                image::RgbImage::from_pixel(self.width, self.height, image::Rgb([90, 90, 90])),
            )))
        }
    }

    struct FailingReader;

    impl ImageReader for FailingReader {
        fn read(&self, _path: &Path) -> Result<StillImage, Box<dyn std::error::Error>> {
            Err("unsupported file".into())
        }
    }

    #[derive(Clone, Default)]
    struct StubImageWriter {
        written: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
    }

    impl ImageWriter for StubImageWriter {
        fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), frame.clone()));
            Ok(())
        }
    }

    struct StubEngine {
        detections: Vec<Detection>,
    }

    impl InferenceEngine for StubEngine {
        fn infer(&mut self, _image: &Frame) -> Result<Vec<Detection>, InferError> {
            Ok(self.detections.clone())
        }
    }

    fn detector(detections: Vec<Detection>) -> Arc<Detector> {
        Arc::new(Detector::new(
            Box::new(StubEngine { detections }),
            DetectorConfig::default(),
        ))
    }

    fn full_frame_cat() -> Detection {
        Detection {
            bounding_box: NormalizedRect::new(0.0, 0.0, 1.0, 1.0),
            confidence: 0.9,
            labels: vec![LabelCandidate::new("cat", 0.9)],
        }
    }

    fn use_case(
        reader: Box<dyn ImageReader>,
        writer: StubImageWriter,
        detector: Arc<Detector>,
    ) -> DetectImageUseCase {
        DetectImageUseCase::new(reader, Box::new(writer), detector, Box::new(NullPipelineLogger))
    }

    #[test]
    fn test_view_defaults_to_image_size() {
        let mut uc = use_case(
            Box::new(StubImageReader { width: 40, height: 20 }),
            StubImageWriter::default(),
            detector(vec![full_frame_cat()]),
        );
        let outcome = uc.execute(Path::new("in.png"), None, None).unwrap();

        assert_eq!(outcome.fit_frame, Rect::new(0.0, 0.0, 40.0, 20.0));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].bounding_box, outcome.fit_frame);
        assert_eq!(outcome.labels[0].text, "cat: 0.90");
    }

    #[test]
    fn test_results_are_placed_in_letterboxed_view() {
        let mut uc = use_case(
            Box::new(StubImageReader { width: 40, height: 20 }),
            StubImageWriter::default(),
            detector(vec![full_frame_cat()]),
        );
        let outcome = uc
            .execute(Path::new("in.png"), Some(Size::new(100.0, 100.0)), None)
            .unwrap();

        assert_eq!(outcome.fit_frame, Rect::new(0.0, 25.0, 100.0, 50.0));
        assert_eq!(outcome.results[0].bounding_box, outcome.fit_frame);
    }

    #[test]
    fn test_annotated_output_is_view_sized() {
        let writer = StubImageWriter::default();
        let written = writer.written.clone();
        let mut uc = use_case(
            Box::new(StubImageReader { width: 40, height: 20 }),
            writer,
            detector(vec![full_frame_cat()]),
        );
        uc.execute(
            Path::new("in.png"),
            Some(Size::new(100.0, 100.0)),
            Some(Path::new("out.png")),
        )
        .unwrap();

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, PathBuf::from("out.png"));
        assert_eq!((written[0].1.width(), written[0].1.height()), (100, 100));
        // top edge of the box outline
        assert_eq!(written[0].1.pixel(50, 25), [255, 255, 255]);
    }

    #[test]
    fn test_no_annotation_path_writes_nothing() {
        let writer = StubImageWriter::default();
        let written = writer.written.clone();
        let mut uc = use_case(
            Box::new(StubImageReader { width: 8, height: 8 }),
            writer,
            detector(Vec::new()),
        );
        let outcome = uc.execute(Path::new("in.png"), None, None).unwrap();
        assert!(outcome.results.is_empty());
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_detector_still_succeeds() {
        let mut uc = use_case(
            Box::new(StubImageReader { width: 8, height: 8 }),
            StubImageWriter::default(),
            Arc::new(Detector::unavailable("missing", DetectorConfig::default())),
        );
        let outcome = uc.execute(Path::new("in.png"), None, None).unwrap();
        assert!(outcome.results.is_empty());
        assert!(outcome.labels.is_empty());
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut uc = use_case(
            Box::new(FailingReader),
            StubImageWriter::default(),
            detector(Vec::new()),
        );
        assert!(uc.execute(Path::new("in.png"), None, None).is_err());
    }
}
