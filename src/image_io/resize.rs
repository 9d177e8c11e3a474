//! Optional export downscaling.
//!
//! Exports can be bounded by a maximum width and/or height. The image is
//! scaled to fit inside the box with its aspect ratio preserved; images
//! already inside the box are left alone.

use super::error::ImageIoError;
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Bounding box for exported images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeTo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
}

impl ResizeTo {
    pub fn new(max_width: Option<u32>, max_height: Option<u32>) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Whether any bound is set.
    pub fn is_bounded(&self) -> bool {
        self.max_width.is_some() || self.max_height.is_some()
    }

    /// Rejects zero bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_width == Some(0) || self.max_height == Some(0) {
            return Err("resize bounds must be positive".to_string());
        }
        Ok(())
    }

    /// Target size for a `width` x `height` source.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale_w = self
            .max_width
            .map(|max| max as f64 / width as f64)
            .unwrap_or(f64::INFINITY);
        let scale_h = self
            .max_height
            .map(|max| max as f64 / height as f64)
            .unwrap_or(f64::INFINITY);
        let scale = scale_w.min(scale_h);

        // Never enlarge
        if scale >= 1.0 {
            return (width, height);
        }

        let target_w = ((width as f64 * scale).round() as u32).max(1);
        let target_h = ((height as f64 * scale).round() as u32).max(1);
        (target_w, target_h)
    }
}

/// Scale `img` to fit `bounds`, returning it unchanged when it already fits.
pub fn fit_within(img: DynamicImage, bounds: &ResizeTo) -> Result<DynamicImage, ImageIoError> {
    let (target_w, target_h) = bounds.target_dimensions(img.width(), img.height());
    if (target_w, target_h) == (img.width(), img.height()) {
        return Ok(img);
    }
    resize_image(&img, target_w, target_h)
}

/// Resize image using fast-image-resize with Lanczos3 filter
pub fn resize_image(
    img: &DynamicImage,
    target_w: u32,
    target_h: u32,
) -> Result<DynamicImage, ImageIoError> {
    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| ImageIoError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageIoError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageIoError::resize_failed("Target width is 0"))?;
    let dst_height = NonZeroU32::new(target_h)
        .ok_or_else(|| ImageIoError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageIoError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageIoError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageIoError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
