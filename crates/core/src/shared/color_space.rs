use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color representation of a decoded still image.
///
/// The working space fed to the model is 8-bit sRGB RGB; anything else is
/// re-rendered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSpace {
    Srgb,
    /// Linear-light RGB (float HDR/EXR sources).
    LinearSrgb,
    Gray,
}

#[derive(Error, Debug, PartialEq)]
pub enum ColorConversionError {
    #[error("cannot obtain a drawable bitmap from a {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
}

impl ColorSpace {
    /// Best guess from the decoded pixel layout: float data is linear,
    /// luma is gray, everything else is treated as sRGB.
    pub fn infer(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => ColorSpace::Gray,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => ColorSpace::LinearSrgb,
            _ => ColorSpace::Srgb,
        }
    }
}

/// True when `image` is already packed 8-bit sRGB RGB and can be used as-is.
pub fn is_working_space(image: &DynamicImage, space: ColorSpace) -> bool {
    space == ColorSpace::Srgb && matches!(image, DynamicImage::ImageRgb8(_))
}

/// Renders `image`, interpreted in `space`, into the 8-bit sRGB working space.
pub fn to_working_rgb(
    image: &DynamicImage,
    space: ColorSpace,
) -> Result<RgbImage, ColorConversionError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ColorConversionError::EmptyImage { width, height });
    }

    if let (ColorSpace::Srgb, DynamicImage::ImageRgb8(rgb)) = (space, image) {
        return Ok(rgb.clone());
    }

    Ok(match space {
        ColorSpace::Srgb | ColorSpace::Gray => image.to_rgb8(),
        ColorSpace::LinearSrgb => {
            let linear = image.to_rgb32f();
            let mut out = RgbImage::new(width, height);
            for (dst, src) in out.pixels_mut().zip(linear.pixels()) {
                dst.0 = src.0.map(encode_srgb);
            }
            out
        }
    })
}

/// sRGB opto-electronic transfer function, linear [0,1] → 8-bit code value.
fn encode_srgb(linear: f32) -> u8 {
    let c = linear.clamp(0.0, 1.0);
    let encoded = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}
