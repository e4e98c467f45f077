use thiserror::Error;

use crate::shared::color_space::ColorConversionError;

/// Boxed error returned across the inference-engine boundary.
pub type InferError = Box<dyn std::error::Error + Send + Sync>;

/// Why a single inference call produced no results.
///
/// [`crate::pipeline::detector::Detector::inference`] turns every variant into
/// an empty result set; `try_inference` exposes them for diagnostics.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("detector unavailable: {0}")]
    ModelUnavailable(String),
    #[error("inference engine failed: {0}")]
    InferenceEngine(#[source] InferError),
    #[error("image conversion failed: {0}")]
    ImageConversion(#[from] ColorConversionError),
    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),
    #[error("sample buffer carries no image data")]
    MissingImageBuffer,
    #[error("an inference is already in flight")]
    Busy,
}

impl DetectError {
    /// Busy calls are an expected backpressure outcome, not a fault.
    pub fn is_dropped_frame(&self) -> bool {
        matches!(self, DetectError::Busy)
    }

    /// Whether a failed call is worth a warning of its own. An unavailable
    /// model is reported once, when the detector is built.
    pub fn is_per_call_fault(&self) -> bool {
        !matches!(self, DetectError::Busy | DetectError::ModelUnavailable(_))
    }
}
