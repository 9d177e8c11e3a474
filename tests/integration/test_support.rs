//! Shared fixtures for integration tests.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use photomark::watermark::{Anchor, Color, Offset, WatermarkSpec};
use std::path::{Path, PathBuf};

/// Opaque image filled with `color`.
pub fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
}

/// Opaque gradient image, so every pixel differs from its neighbours.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    }))
}

/// Write `image` to `dir/name` in the format implied by the extension.
pub fn write_image(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    let format = ImageFormat::from_path(&path).expect("test image needs a known extension");
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image.clone(),
    };
    image.save_with_format(&path, format).expect("Failed to write test image");
    path
}

/// Black, fully opaque, centered text.
pub fn black_text(text: &str, size: f32) -> WatermarkSpec {
    WatermarkSpec {
        text: text.to_string(),
        font_size_pt: size,
        color: Color::black(),
        opacity: 1.0,
        rotation_degrees: 0.0,
        anchor: Anchor::Center,
        offset: Offset::default(),
        ..WatermarkSpec::default()
    }
}
