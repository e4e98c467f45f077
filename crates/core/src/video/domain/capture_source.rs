use std::time::Duration;

use crate::detection::domain::image_source::SampleBuffer;
use crate::shared::constants::MIN_CAPTURE_FPS;
use crate::shared::orientation::Orientation;

/// Boxed error that can cross the capture thread boundary.
pub type CaptureError = Box<dyn std::error::Error + Send + Sync>;

/// A stream of camera samples in sensor orientation.
pub trait CaptureSource: Send {
    /// How each sample must be rotated to appear upright.
    fn orientation(&self) -> Orientation;

    /// The next sample, or `None` once the source is exhausted.
    fn next_sample(&mut self) -> Option<Result<SampleBuffer, CaptureError>>;
}

/// Spacing between frames at `fps`, or `None` for unpaced capture
/// (zero, negative or non-finite rates). Rates below [`MIN_CAPTURE_FPS`]
/// are clamped to it.
pub fn frame_interval(fps: f64) -> Option<Duration> {
    if !(fps > 0.0) || !fps.is_finite() {
        return None;
    }
    Some(Duration::from_secs_f64(1.0 / fps.max(MIN_CAPTURE_FPS)))
}
