//! Watermark compositor for blending a rendered layer onto an image.
//!
//! Blending uses straight (non-premultiplied) alpha with the Porter-Duff
//! "over" operator. Layer pixels outside the target are clipped and fully
//! transparent layer pixels leave the target byte-identical.
//!
//! [`composite_onto`] blends in the target's own pixel type, so 16-bit and
//! float images keep their depth and grayscale or opaque images keep their
//! channel layout.

use super::position::PlacementPosition;
use image::{
    DynamicImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba, RgbaImage,
};

/// A watermark layer positioned on the target image.
#[derive(Clone)]
pub struct WatermarkLayer {
    /// The watermark image (RGBA, straight alpha).
    pub image: RgbaImage,
    /// Top-left corner in target coordinates.
    pub position: PlacementPosition,
}

impl std::fmt::Debug for WatermarkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkLayer")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("position", &self.position)
            .finish()
    }
}

/// Axis-aligned pixel rectangle, `x..x+width` by `y..y+height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

impl WatermarkLayer {
    /// Intersection of the layer rectangle with a `width` x `height` target.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Region> {
        let x_start = (self.position.x as i64).max(0);
        let y_start = (self.position.y as i64).max(0);
        let x_end = (self.position.x as i64 + self.image.width() as i64).min(width as i64);
        let y_end = (self.position.y as i64 + self.image.height() as i64).min(height as i64);

        if x_start >= x_end || y_start >= y_end {
            return None;
        }

        Some(Region {
            x: x_start as u32,
            y: y_start as u32,
            width: (x_end - x_start) as u32,
            height: (y_end - y_start) as u32,
        })
    }
}

/// Blend a watermark layer onto the target image.
///
/// Returns the clipped region the layer covered, or `None` if the layer lies
/// entirely outside the target.
pub fn blend_layer(target: &mut RgbaImage, layer: &WatermarkLayer) -> Option<Region> {
    let region = layer.clip_to(target.width(), target.height())?;

    for ty in region.y..region.y + region.height {
        for tx in region.x..region.x + region.width {
            let wx = (tx as i64 - layer.position.x as i64) as u32;
            let wy = (ty as i64 - layer.position.y as i64) as u32;

            let wm_pixel = *layer.image.get_pixel(wx, wy);
            if wm_pixel[3] == 0 {
                continue;
            }

            let target_pixel = target.get_pixel_mut(tx, ty);
            *target_pixel = blend_over(*target_pixel, wm_pixel);
        }
    }

    Some(region)
}

/// Blend `layer` onto `target` without changing its pixel type.
///
/// Returns the clipped region the layer covered, or `None` if the layer lies
/// entirely outside the target.
pub fn composite_onto(target: &mut DynamicImage, layer: &WatermarkLayer) -> Option<Region> {
    let region = layer.clip_to(target.width(), target.height())?;

    match target {
        DynamicImage::ImageRgba8(buf) => {
            blend_layer(buf, layer);
        }
        DynamicImage::ImageRgb8(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Rgb<u8>| [unit8(p[0]), unit8(p[1]), unit8(p[2]), 1.0],
            |c| Rgb([byte(c[0]), byte(c[1]), byte(c[2])]),
        ),
        DynamicImage::ImageLuma8(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Luma<u8>| gray(unit8(p[0]), 1.0),
            |c| Luma([byte(luma(&c))]),
        ),
        DynamicImage::ImageLumaA8(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &LumaA<u8>| gray(unit8(p[0]), unit8(p[1])),
            |c| LumaA([byte(luma(&c)), byte(c[3])]),
        ),
        DynamicImage::ImageRgba16(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Rgba<u16>| [unit16(p[0]), unit16(p[1]), unit16(p[2]), unit16(p[3])],
            |c| Rgba([word(c[0]), word(c[1]), word(c[2]), word(c[3])]),
        ),
        DynamicImage::ImageRgb16(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Rgb<u16>| [unit16(p[0]), unit16(p[1]), unit16(p[2]), 1.0],
            |c| Rgb([word(c[0]), word(c[1]), word(c[2])]),
        ),
        DynamicImage::ImageLuma16(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Luma<u16>| gray(unit16(p[0]), 1.0),
            |c| Luma([word(luma(&c))]),
        ),
        DynamicImage::ImageLumaA16(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &LumaA<u16>| gray(unit16(p[0]), unit16(p[1])),
            |c| LumaA([word(luma(&c)), word(c[3])]),
        ),
        DynamicImage::ImageRgba32F(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Rgba<f32>| [p[0], p[1], p[2], p[3]],
            |c| Rgba(c),
        ),
        DynamicImage::ImageRgb32F(buf) => blend_region(
            buf,
            layer,
            region,
            |p: &Rgb<f32>| [p[0], p[1], p[2], 1.0],
            |c| Rgb([c[0], c[1], c[2]]),
        ),
        other => {
            let mut buf = other.to_rgba8();
            blend_layer(&mut buf, layer);
            *other = DynamicImage::ImageRgba8(buf);
        }
    }

    Some(region)
}

/// Blend the layer over `region` of an arbitrary buffer through normalized
/// straight-alpha RGBA.
fn blend_region<P, R, W>(
    target: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    layer: &WatermarkLayer,
    region: Region,
    read: R,
    write: W,
) where
    P: Pixel,
    R: Fn(&P) -> [f32; 4],
    W: Fn([f32; 4]) -> P,
{
    for ty in region.y..region.y + region.height {
        for tx in region.x..region.x + region.width {
            let wx = (tx as i64 - layer.position.x as i64) as u32;
            let wy = (ty as i64 - layer.position.y as i64) as u32;

            let wm_pixel = layer.image.get_pixel(wx, wy);
            if wm_pixel[3] == 0 {
                continue;
            }
            let foreground = [
                unit8(wm_pixel[0]),
                unit8(wm_pixel[1]),
                unit8(wm_pixel[2]),
                unit8(wm_pixel[3]),
            ];

            let pixel = target.get_pixel_mut(tx, ty);
            *pixel = write(blend_over_unit(read(&*pixel), foreground));
        }
    }
}

/// [`blend_over`] on normalized channels.
fn blend_over_unit(background: [f32; 4], foreground: [f32; 4]) -> [f32; 4] {
    let fg_alpha = foreground[3];
    let bg_alpha = background[3];
    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);
    if out_alpha <= 0.0 {
        return [0.0; 4];
    }

    let channel = |i: usize| {
        (foreground[i] * fg_alpha + background[i] * bg_alpha * (1.0 - fg_alpha)) / out_alpha
    };
    [channel(0), channel(1), channel(2), out_alpha]
}

fn gray(value: f32, alpha: f32) -> [f32; 4] {
    [value, value, value, alpha]
}

/// Rec. 709 luma, as `image` uses for RGB to gray conversion.
fn luma(c: &[f32; 4]) -> f32 {
    0.2126 * c[0] + 0.7152 * c[1] + 0.0722 * c[2]
}

fn unit8(v: u8) -> f32 {
    v as f32 / 255.0
}

fn unit16(v: u16) -> f32 {
    v as f32 / 65535.0
}

fn byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn word(v: f32) -> u16 {
    (v * 65535.0).round().clamp(0.0, 65535.0) as u16
}

/// Blend two straight-alpha pixels with the "over" operator.
///
/// result = foreground + background * (1 - foreground.alpha)
pub fn blend_over(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    if foreground[3] == 0 {
        return background;
    }
    if foreground[3] == 255 {
        return foreground;
    }

    let fg_alpha = foreground[3] as f32 / 255.0;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
