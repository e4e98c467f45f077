use crate::detection::domain::detect_error::InferError;
use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// The black-box model: upright working-space image in, raw detections out.
///
/// Boxes are normalized to the full input image with a bottom-left origin
/// and labels sorted by descending confidence. Any input cropping or
/// letterboxing the model needs happens inside the implementation.
///
/// Implementations may keep per-session state, hence `&mut self`; callers
/// never invoke one engine concurrently.
pub trait InferenceEngine: Send {
    fn infer(&mut self, image: &Frame) -> Result<Vec<Detection>, InferError>;
}
