use crate::shared::geometry::{NormalizedRect, Rect};

/// Places a model-space box into view space.
///
/// `fit_frame` is where the image is drawn in the view. The steps run in a
/// fixed order: flip to a top-left origin while still normalized, scale to
/// the fit frame's extent, standardize, then translate by the fit frame's
/// origin.
pub fn map_to_fit_frame(bbox: &NormalizedRect, fit_frame: &Rect) -> Rect {
    let flipped = bbox.flipped_vertically();
    let scaled = Rect::new(
        flipped.x * fit_frame.width,
        flipped.y * fit_frame.height,
        flipped.width * fit_frame.width,
        flipped.height * fit_frame.height,
    )
    .standardized();
    scaled.translated(fit_frame.x, fit_frame.y)
}
