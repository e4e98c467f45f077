use std::time::Duration;

use image::DynamicImage;

use crate::detection::domain::detect_error::DetectError;
use crate::shared::color_space::{self, ColorSpace};
use crate::shared::frame::{Frame, RGB_CHANNELS};
use crate::shared::geometry::Size;
use crate::shared::orientation::Orientation;

/// Byte layout of a packed camera buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    fn rgb_at(self, px: &[u8]) -> [u8; 3] {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => [px[0], px[1], px[2]],
            PixelFormat::Bgra8 => [px[2], px[1], px[0]],
        }
    }
}

/// A decoded photo plus the color space its pixels are expressed in.
#[derive(Clone, Debug)]
pub struct StillImage {
    image: DynamicImage,
    color_space: ColorSpace,
}

impl StillImage {
    /// Wraps `image`, inferring its color space from the pixel layout.
    pub fn new(image: DynamicImage) -> Self {
        let color_space = ColorSpace::infer(&image);
        Self { image, color_space }
    }

    pub fn with_color_space(image: DynamicImage, color_space: ColorSpace) -> Self {
        Self { image, color_space }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width() as f64, self.image.height() as f64)
    }

    /// Converts to an upright working-space frame, re-rendering when the
    /// source is not already 8-bit sRGB.
    pub fn to_frame(&self) -> Result<Frame, DetectError> {
        if !color_space::is_working_space(&self.image, self.color_space) {
            log::debug!(
                "Re-rendering {:?} still image into sRGB working space",
                self.color_space
            );
        }
        let rgb = color_space::to_working_rgb(&self.image, self.color_space)?;
        Ok(Frame::from_rgb_image(rgb, 0))
    }
}

/// Raw pixels straight from a capture device, possibly row-padded.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
}

impl PixelBuffer {
    /// A buffer whose rows are tightly packed.
    pub fn packed(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        let bytes_per_row = width as usize * format.bytes_per_pixel();
        Self::with_stride(data, width, height, bytes_per_row, format)
    }

    pub fn with_stride(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
    ) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_row,
            format,
        }
    }

    /// Packs an upright frame into a buffer of the given format.
    pub fn from_frame(frame: &Frame, format: PixelFormat) -> Self {
        let mut data =
            Vec::with_capacity(frame.data().len() / RGB_CHANNELS * format.bytes_per_pixel());
        for px in frame.data().chunks_exact(RGB_CHANNELS) {
            match format {
                PixelFormat::Rgb8 => data.extend_from_slice(px),
                PixelFormat::Rgba8 => data.extend_from_slice(&[px[0], px[1], px[2], 255]),
                PixelFormat::Bgra8 => data.extend_from_slice(&[px[2], px[1], px[0], 255]),
            }
        }
        Self::packed(data, frame.width(), frame.height(), format)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// Unpacks into an RGB frame in stored (not yet re-oriented) layout.
    pub fn to_frame(&self, index: usize) -> Result<Frame, DetectError> {
        let bpp = self.format.bytes_per_pixel();
        let too_large = || {
            DetectError::InvalidBuffer(format!(
                "{}x{} with {} bytes per row overflows the address space",
                self.width, self.height, self.bytes_per_row
            ))
        };
        let row_bytes = (self.width as usize)
            .checked_mul(bpp)
            .ok_or_else(too_large)?;
        if self.bytes_per_row < row_bytes {
            return Err(DetectError::InvalidBuffer(format!(
                "{} bytes per row is too small for {} px of {:?}",
                self.bytes_per_row, self.width, self.format
            )));
        }
        let needed = match self.height {
            0 => 0,
            h => self
                .bytes_per_row
                .checked_mul(h as usize - 1)
                .and_then(|n| n.checked_add(row_bytes))
                .ok_or_else(too_large)?,
        };
        if self.data.len() < needed {
            return Err(DetectError::InvalidBuffer(format!(
                "{} bytes provided, {needed} required for {}x{}",
                self.data.len(),
                self.width,
                self.height
            )));
        }

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * RGB_CHANNELS);
        for row in 0..self.height as usize {
            let start = row * self.bytes_per_row;
            for px in self.data[start..start + row_bytes].chunks_exact(bpp) {
                rgb.extend_from_slice(&self.format.rgb_at(px));
            }
        }
        Ok(Frame::new(rgb, self.width, self.height, index))
    }
}

/// A captured video sample: an optional image buffer plus its timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    image_buffer: Option<PixelBuffer>,
    presentation_time: Duration,
    sequence: usize,
}

impl SampleBuffer {
    pub fn new(image_buffer: Option<PixelBuffer>, presentation_time: Duration, sequence: usize) -> Self {
        Self {
            image_buffer,
            presentation_time,
            sequence,
        }
    }

    pub fn image_buffer(&self) -> Option<&PixelBuffer> {
        self.image_buffer.as_ref()
    }

    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

/// Every input the detector accepts. Buffer variants carry the orientation
/// needed to make their pixels upright; still images are always upright.
#[derive(Clone, Debug)]
pub enum ImageSource {
    StillImage(StillImage),
    PixelBuffer {
        buffer: PixelBuffer,
        orientation: Orientation,
    },
    SampleBuffer {
        buffer: SampleBuffer,
        orientation: Orientation,
    },
}

impl ImageSource {
    pub fn orientation(&self) -> Orientation {
        match self {
            ImageSource::StillImage(_) => Orientation::Up,
            ImageSource::PixelBuffer { orientation, .. }
            | ImageSource::SampleBuffer { orientation, .. } => *orientation,
        }
    }

    /// Size of the image as it will be displayed, for fit-frame computation.
    ///
    /// `None` for a sample buffer without image data.
    pub fn upright_size(&self) -> Option<Size> {
        match self {
            ImageSource::StillImage(still) => Some(still.size()),
            ImageSource::PixelBuffer {
                buffer,
                orientation,
            } => Some(orientation.upright_size(buffer.size())),
            ImageSource::SampleBuffer {
                buffer,
                orientation,
            } => buffer
                .image_buffer()
                .map(|b| orientation.upright_size(b.size())),
        }
    }

    /// Normalizes any source into the upright working-space frame the
    /// inference engine consumes.
    pub fn to_upright_frame(&self) -> Result<Frame, DetectError> {
        match self {
            ImageSource::StillImage(still) => still.to_frame(),
            ImageSource::PixelBuffer {
                buffer,
                orientation,
            } => Ok(orientation.apply(&buffer.to_frame(0)?)),
            ImageSource::SampleBuffer {
                buffer,
                orientation,
            } => {
                let pixels = buffer
                    .image_buffer()
                    .ok_or(DetectError::MissingImageBuffer)?;
                Ok(orientation.apply(&pixels.to_frame(buffer.sequence())?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, RgbaImage};

    fn two_by_one(format: PixelFormat) -> PixelBuffer {
        let frame = {
            let mut f = Frame::filled(2, 1, [0, 0, 0], 0);
            f.put_pixel(0, 0, [10, 20, 30]);
            f.put_pixel(1, 0, [40, 50, 60]);
            f
        };
        PixelBuffer::from_frame(&frame, format)
    }

    #[test]
    fn test_pixel_formats_unpack_to_rgb() {
        for format in [PixelFormat::Rgb8, PixelFormat::Rgba8, PixelFormat::Bgra8] {
            let frame = two_by_one(format).to_frame(0).unwrap();
            assert_eq!(frame.pixel(0, 0), [10, 20, 30], "{format:?}");
            assert_eq!(frame.pixel(1, 0), [40, 50, 60], "{format:?}");
        }
    }

    #[test]
    fn test_bgra_bytes_are_swizzled() {
        let buffer = PixelBuffer::packed(vec![1, 2, 3, 255], 1, 1, PixelFormat::Bgra8);
        assert_eq!(buffer.to_frame(0).unwrap().pixel(0, 0), [3, 2, 1]);
    }

    #[test]
    fn test_row_padding_is_skipped() {
        // 1x2 RGB with 2 bytes of padding per row
        let data = vec![1, 2, 3, 0, 0, 4, 5, 6];
        let buffer = PixelBuffer::with_stride(data, 1, 2, 5, PixelFormat::Rgb8);
        let frame = buffer.to_frame(0).unwrap();
        assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
        assert_eq!(frame.pixel(0, 1), [4, 5, 6]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let buffer = PixelBuffer::packed(vec![0; 7], 2, 1, PixelFormat::Rgba8);
        assert!(matches!(
            buffer.to_frame(0),
            Err(DetectError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_stride_smaller_than_row_is_rejected() {
        let buffer = PixelBuffer::with_stride(vec![0; 64], 4, 2, 8, PixelFormat::Rgba8);
        assert!(matches!(
            buffer.to_frame(0),
            Err(DetectError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_overflowing_stride_is_rejected() {
        let buffer =
            PixelBuffer::with_stride(vec![0; 12], 1, 3, usize::MAX / 2 + 1, PixelFormat::Rgba8);
        assert!(matches!(
            buffer.to_frame(0),
            Err(DetectError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_still_image_orientation_is_up() {
        let source = ImageSource::StillImage(StillImage::new(DynamicImage::ImageRgb8(
            RgbImage::new(4, 3),
        )));
        assert_eq!(source.orientation(), Orientation::Up);
        assert_eq!(source.upright_size(), Some(Size::new(4.0, 3.0)));
    }

    #[test]
    fn test_still_image_rgba_is_normalized() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([7, 8, 9, 0]));
        let still = StillImage::new(DynamicImage::ImageRgba8(img));
        let frame = still.to_frame().unwrap();
        assert_eq!(frame.pixel(0, 0), [7, 8, 9]);
    }

    #[test]
    fn test_still_image_empty_fails_conversion() {
        let still = StillImage::new(DynamicImage::ImageRgb8(RgbImage::new(0, 0)));
        assert!(matches!(
            still.to_frame(),
            Err(DetectError::ImageConversion(_))
        ));
    }

    #[test]
    fn test_pixel_buffer_source_applies_orientation() {
        // Stored landscape 2x1 → upright portrait 1x2 with Right
        let source = ImageSource::PixelBuffer {
            buffer: two_by_one(PixelFormat::Rgba8),
            orientation: Orientation::Right,
        };
        assert_eq!(source.upright_size(), Some(Size::new(1.0, 2.0)));
        let frame = source.to_upright_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (1, 2));
        assert_eq!(frame.pixel(0, 0), [10, 20, 30]);
        assert_eq!(frame.pixel(0, 1), [40, 50, 60]);
    }

    #[test]
    fn test_sample_buffer_keeps_sequence_number() {
        let sample = SampleBuffer::new(
            Some(two_by_one(PixelFormat::Bgra8)),
            Duration::from_millis(33),
            12,
        );
        let source = ImageSource::SampleBuffer {
            buffer: sample,
            orientation: Orientation::Up,
        };
        let frame = source.to_upright_frame().unwrap();
        assert_eq!(frame.index(), 12);
    }

    #[test]
    fn test_sample_buffer_without_image_data() {
        let source = ImageSource::SampleBuffer {
            buffer: SampleBuffer::new(None, Duration::ZERO, 0),
            orientation: Orientation::Right,
        };
        assert!(source.upright_size().is_none());
        assert!(matches!(
            source.to_upright_frame(),
            Err(DetectError::MissingImageBuffer)
        ));
    }

    #[test]
    fn test_still_image_explicit_color_space() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let still = StillImage::with_color_space(DynamicImage::ImageRgb8(img), ColorSpace::LinearSrgb);
        assert_eq!(still.color_space(), ColorSpace::LinearSrgb);
        assert_eq!(still.to_frame().unwrap().pixel(0, 0), [255, 0, 0]);
    }
}
