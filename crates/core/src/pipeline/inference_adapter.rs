use crate::detection::domain::detect_error::DetectError;
use crate::detection::domain::detection::DetectionResult;
use crate::detection::domain::detector_config::DetectorConfig;
use crate::detection::domain::geometry_mapper::map_to_fit_frame;
use crate::detection::domain::image_source::ImageSource;
use crate::detection::domain::inference_engine::InferenceEngine;
use crate::shared::geometry::Rect;

use super::detection_filter::filter_detections;

/// Runs one source through the engine and the post-processing stages.
///
/// The source is normalized to an upright working-space frame first; a
/// conversion failure returns before the engine is touched. Raw detections
/// are filtered against `config`, then mapped into `fit_frame`, preserving
/// the engine's order.
pub fn run_inference(
    engine: &mut dyn InferenceEngine,
    source: &ImageSource,
    fit_frame: &Rect,
    config: &DetectorConfig,
) -> Result<Vec<DetectionResult>, DetectError> {
    let frame = source.to_upright_frame()?;
    let detections = engine
        .infer(&frame)
        .map_err(DetectError::InferenceEngine)?;

    let kept = filter_detections(
        detections,
        config.label_confidence_threshold,
        config.result_confidence_threshold,
    );

    Ok(kept
        .into_iter()
        .map(|d| DetectionResult {
            bounding_box: map_to_fit_frame(&d.bounding_box, fit_frame),
            confidence: d.confidence,
            labels: d.labels,
        })
        .collect())
}
