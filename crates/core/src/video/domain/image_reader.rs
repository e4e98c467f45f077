use std::path::Path;

use crate::detection::domain::image_source::StillImage;

/// Decodes a still image file, upright and tagged with its color space.
pub trait ImageReader: Send {
    fn read(&self, path: &Path) -> Result<StillImage, Box<dyn std::error::Error>>;
}
