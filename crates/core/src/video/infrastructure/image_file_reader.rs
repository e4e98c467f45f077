use std::path::Path;

use image::{DynamicImage, ImageDecoder};

use crate::detection::domain::image_source::StillImage;
use crate::shared::orientation::Orientation;
use crate::video::domain::image_reader::ImageReader;

/// Decodes still images with the `image` crate.
///
/// EXIF orientation is applied while decoding, so the returned image is
/// upright as a photo viewer would show it.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader for ImageFileReader {
    fn read(&self, path: &Path) -> Result<StillImage, Box<dyn std::error::Error>> {
        let mut decoder = image::ImageReader::open(path)?
            .with_guessed_format()?
            .into_decoder()?;
        let orientation = decoder.orientation()?;
        let stored = Orientation::from_exif(orientation.to_exif()).unwrap_or_default();
        let mut img = DynamicImage::from_decoder(decoder)?;
        img.apply_orientation(orientation);
        log::debug!(
            "Read {} ({}x{}, {:?}, stored {:?})",
            path.display(),
            img.width(),
            img.height(),
            img.color(),
            stored
        );
        Ok(StillImage::new(img))
    }
}
