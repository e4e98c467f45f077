use crate::detection::domain::detection::Detection;

/// Keeps detections that pass both confidence gates, in their original order.
///
/// - Dropped if `confidence < result_threshold`.
/// - Dropped if the top label's confidence is below `label_threshold`. A
///   detection without labels counts as -1 and therefore always fails.
///
/// A value equal to its threshold is kept. A NaN confidence is not below
/// any threshold, so it is kept too.
pub fn filter_detections(
    detections: Vec<Detection>,
    label_threshold: f32,
    result_threshold: f32,
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| {
            passes(d.confidence, result_threshold) && passes(d.top_label_confidence(), label_threshold)
        })
        .collect()
}

fn passes(value: f32, threshold: f32) -> bool {
    value >= threshold || value.is_nan()
}
