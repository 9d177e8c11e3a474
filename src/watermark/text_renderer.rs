//! Text watermark rendering.
//!
//! Renders a [`WatermarkSpec`]'s text into a transparent RGBA layer that can
//! be composited onto target images.
//!
//! # Pipeline
//!
//! 1. Lay out glyphs line by line (advance widths + kerning). One point
//!    renders as one pixel of em size.
//! 2. Rasterize glyph coverage, then synthesize italic (shear) and bold
//!    (dilation) when the resolved face lacks them.
//! 3. Paint shadow (offset, gaussian blur), stroke (dilated coverage) and
//!    fill, in that order.
//! 4. Rotate counter-clockwise about the layer center, growing the canvas.
//! 5. Multiply alpha by the spec opacity.

use super::compositor::blend_over;
use super::config::{Color, WatermarkSpec};
use super::font::ResolvedFont;
use super::WatermarkError;
use ab_glyph::{point, Font, FontArc, OutlinedGlyph, PxScale, ScaleFont};
use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};

/// Horizontal shear applied per pixel of height for synthetic italics.
const SYNTHETIC_ITALIC_SHEAR: f32 = 0.2;

/// Synthetic bold dilation radius as a fraction of the em size.
const SYNTHETIC_BOLD_RATIO: f32 = 1.0 / 32.0;

/// Largest layer edge we are willing to allocate.
const MAX_LAYER_DIMENSION: u32 = 16_384;

/// Largest stroke width, synthetic bold radius or shadow blur radius, in
/// pixels. Dilation cost grows with the square of the radius.
pub const MAX_EFFECT_RADIUS: f32 = 128.0;

/// Advance-based size of a block of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMetrics {
    pub width: u32,
    pub height: u32,
    pub lines: usize,
}

/// Convert a point size to an ab_glyph scale (1pt == 1px of em).
///
/// `PxScale` measures ascent-to-descent height, not the em square, so the
/// size is rescaled by the face's height/em ratio.
pub fn px_scale(font: &FontArc, size_pt: f32) -> PxScale {
    match font.units_per_em() {
        Some(units_per_em) if units_per_em > 0.0 => {
            PxScale::from(size_pt * font.height_unscaled() / units_per_em)
        }
        _ => PxScale::from(size_pt),
    }
}

struct Layout {
    glyphs: Vec<OutlinedGlyph>,
    width: f32,
    height: f32,
    lines: usize,
}

fn layout_text(font: &FontArc, text: &str, size_pt: f32) -> Layout {
    let scale = px_scale(font, size_pt);
    let scaled_font = font.as_scaled(scale);
    let line_advance = scaled_font.height() + scaled_font.line_gap();

    let mut glyphs = Vec::new();
    let mut width = 0.0f32;
    let lines: Vec<&str> = text.split('\n').collect();

    for (index, line) in lines.iter().enumerate() {
        let baseline_y = scaled_font.ascent() + index as f32 * line_advance;
        let mut cursor_x = 0.0f32;
        let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

        for c in line.chars().filter(|c| !c.is_control()) {
            let glyph_id = scaled_font.glyph_id(c);

            if let Some(prev) = prev_glyph {
                cursor_x += scaled_font.kern(prev, glyph_id);
            }

            let glyph = glyph_id.with_scale_and_position(scale, point(cursor_x, baseline_y));
            if let Some(outlined) = font.outline_glyph(glyph) {
                glyphs.push(outlined);
            }

            cursor_x += scaled_font.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }

        width = width.max(cursor_x);
    }

    let height = scaled_font.height() + (lines.len() - 1) as f32 * line_advance;

    Layout {
        glyphs,
        width,
        height,
        lines: lines.len(),
    }
}

/// Measure the advance-based bounding box of `text`.
///
/// Multi-line text (`\n`) is stacked using the face's line gap.
pub fn measure_text(font: &ResolvedFont, text: &str, size_pt: f32) -> TextMetrics {
    let layout = layout_text(&font.font, text, size_pt);
    TextMetrics {
        width: layout.width.ceil().max(0.0) as u32,
        height: layout.height.ceil().max(0.0) as u32,
        lines: layout.lines,
    }
}

/// Single-channel coverage buffer with values in `[0, 1]`.
#[derive(Debug, Clone)]
struct Coverage {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Coverage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    fn get(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    fn add(&mut self, x: i64, y: i64, value: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let cell = &mut self.data[y as usize * self.width as usize + x as usize];
        *cell = (*cell + value).min(1.0);
    }

    /// Grow every shape by `radius` pixels (antialiased disk max filter).
    fn dilate(&self, radius: f32) -> Coverage {
        if radius <= 0.0 {
            return self.clone();
        }

        let reach = radius.ceil() as i64;
        let mut kernel = Vec::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let distance = ((dx * dx + dy * dy) as f32).sqrt();
                let weight = (radius + 0.5 - distance).clamp(0.0, 1.0);
                if weight > 0.0 {
                    kernel.push((dx, dy, weight));
                }
            }
        }

        let mut out = Coverage::new(self.width, self.height);
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                let mut value = 0.0f32;
                for &(dx, dy, weight) in &kernel {
                    value = value.max(self.get(x + dx, y + dy) * weight);
                    if value >= 1.0 {
                        break;
                    }
                }
                out.data[y as usize * self.width as usize + x as usize] = value;
            }
        }
        out
    }

    /// Lean shapes to the right: the bottom row stays put, each row above
    /// shifts by `shear` pixels per row.
    fn shear(&self, shear: f32) -> Coverage {
        let extra = (shear * self.height as f32).ceil() as u32;
        let mut out = Coverage::new(self.width + extra, self.height);

        for y in 0..self.height as i64 {
            let shift = shear * (self.height as i64 - 1 - y) as f32;
            let whole = shift.floor() as i64;
            let frac = shift - whole as f32;
            for x in 0..out.width as i64 {
                let src = x - whole;
                let value = self.get(src, y) * (1.0 - frac) + self.get(src - 1, y) * frac;
                if value > 0.0 {
                    out.data[y as usize * out.width as usize + x as usize] = value;
                }
            }
        }
        out
    }

    /// Gaussian blur with the given sigma after padding by 3 sigma.
    ///
    /// Returns the blurred buffer and the padding added on each side.
    fn blur(&self, sigma: f32) -> (Coverage, u32) {
        if sigma <= 0.0 {
            return (self.clone(), 0);
        }

        // Callers keep sigma within MAX_EFFECT_RADIUS.
        let pad = (sigma.min(MAX_EFFECT_RADIUS) * 3.0).ceil() as u32;
        let mut gray = GrayImage::new(self.width + pad * 2, self.height + pad * 2);
        for y in 0..self.height {
            for x in 0..self.width {
                let value = self.get(x as i64, y as i64);
                gray.put_pixel(x + pad, y + pad, Luma([(value * 255.0).round() as u8]));
            }
        }

        let blurred = imageops::blur(&gray, sigma);
        let data = blurred.pixels().map(|p| p[0] as f32 / 255.0).collect();
        (
            Coverage {
                width: blurred.width(),
                height: blurred.height(),
                data,
            },
            pad,
        )
    }

    /// Paint `color` through this coverage onto `layer` at `(origin_x, origin_y)`.
    fn paint(&self, layer: &mut RgbaImage, origin_x: i64, origin_y: i64, color: Color) {
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                let coverage = self.get(x, y);
                if coverage <= 0.0 {
                    continue;
                }
                let lx = x + origin_x;
                let ly = y + origin_y;
                if lx < 0 || ly < 0 || lx >= layer.width() as i64 || ly >= layer.height() as i64 {
                    continue;
                }
                let alpha = (coverage * color.a as f32).round() as u8;
                if alpha == 0 {
                    continue;
                }
                let pixel = layer.get_pixel_mut(lx as u32, ly as u32);
                *pixel = blend_over(*pixel, Rgba([color.r, color.g, color.b, alpha]));
            }
        }
    }
}

fn check_effect_radius(name: &str, radius: f32) -> Result<(), WatermarkError> {
    if radius > MAX_EFFECT_RADIUS {
        return Err(WatermarkError::RenderError(format!(
            "{} {} exceeds the {} pixel limit",
            name, radius, MAX_EFFECT_RADIUS
        )));
    }
    Ok(())
}

fn check_dimensions(width: i64, height: i64) -> Result<(u32, u32), WatermarkError> {
    if width <= 0 || height <= 0 {
        return Err(WatermarkError::RenderError(format!(
            "text layer would be empty ({}x{})",
            width, height
        )));
    }
    if width > MAX_LAYER_DIMENSION as i64 || height > MAX_LAYER_DIMENSION as i64 {
        return Err(WatermarkError::RenderError(format!(
            "text layer {}x{} exceeds the {} pixel limit",
            width, height, MAX_LAYER_DIMENSION
        )));
    }
    Ok((width as u32, height as u32))
}

/// Rasterize the fill coverage of `spec.text`, padded by `pad` on all sides.
fn rasterize(font: &ResolvedFont, spec: &WatermarkSpec, pad: u32) -> Result<Coverage, WatermarkError> {
    let layout = layout_text(&font.font, &spec.text, spec.font_size_pt);

    // Ink may overhang the advance box (side bearings, accents).
    let mut min_x = 0.0f32;
    let mut min_y = 0.0f32;
    let mut max_x = layout.width;
    let mut max_y = layout.height;
    for glyph in &layout.glyphs {
        let bounds = glyph.px_bounds();
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }

    // Float-to-int casts saturate; keep the arithmetic saturating too so
    // absurd sizes land in check_dimensions instead of overflowing.
    let span = |min: f32, max: f32| {
        (max.ceil() as i64)
            .saturating_sub(min.floor() as i64)
            .saturating_add(2 * pad as i64)
    };
    let (width, height) = check_dimensions(span(min_x, max_x), span(min_y, max_y))?;
    let origin_x = pad as i64 - min_x.floor() as i64;
    let origin_y = pad as i64 - min_y.floor() as i64;

    let mut coverage = Coverage::new(width, height);
    for glyph in &layout.glyphs {
        let bounds = glyph.px_bounds();
        let base_x = bounds.min.x as i64 + origin_x;
        let base_y = bounds.min.y as i64 + origin_y;
        glyph.draw(|px, py, c| {
            coverage.add(base_x + px as i64, base_y + py as i64, c);
        });
    }

    Ok(coverage)
}

/// Render the text, shadow and stroke of `spec` into an unrotated layer.
///
/// Opacity is not applied here; see [`render_layer`].
pub fn render_text(spec: &WatermarkSpec, font: &ResolvedFont) -> Result<RgbaImage, WatermarkError> {
    if spec.text.is_empty() {
        return Err(WatermarkError::RenderError(
            "Cannot render empty text".to_string(),
        ));
    }

    let bold_radius = if spec.bold && !font.bold {
        (spec.font_size_pt * SYNTHETIC_BOLD_RATIO).clamp(0.5, MAX_EFFECT_RADIUS)
    } else {
        0.0
    };
    let stroke_width = spec.stroke.map(|s| s.width).unwrap_or(0.0);
    check_effect_radius("stroke width", stroke_width)?;
    if let Some(shadow) = &spec.shadow {
        check_effect_radius("shadow blur radius", shadow.blur_radius)?;
    }
    let pad = (bold_radius + stroke_width).ceil() as u32 + 1;

    let mut fill = rasterize(font, spec, pad)?;
    if spec.italic && !font.italic {
        fill = fill.shear(SYNTHETIC_ITALIC_SHEAR);
    }
    if bold_radius > 0.0 {
        fill = fill.dilate(bold_radius);
    }

    let stroke = spec
        .stroke
        .filter(|s| s.width > 0.0)
        .map(|s| (fill.dilate(s.width), s.color));

    // Shadow follows the outer silhouette (stroke if present).
    let shadow = spec.shadow.map(|shadow| {
        let silhouette = stroke.as_ref().map(|(c, _)| c).unwrap_or(&fill);
        let (blurred, blur_pad) = silhouette.blur(shadow.blur_radius);
        let sx = (shadow.offset_x.round() as i64).saturating_sub(blur_pad as i64);
        let sy = (shadow.offset_y.round() as i64).saturating_sub(blur_pad as i64);
        (blurred, sx, sy, shadow.color)
    });

    // Canvas is the union of the text frame and the shifted shadow frame.
    let mut min_x = 0i64;
    let mut min_y = 0i64;
    let mut max_x = fill.width as i64;
    let mut max_y = fill.height as i64;
    if let Some((mask, sx, sy, _)) = &shadow {
        min_x = min_x.min(*sx);
        min_y = min_y.min(*sy);
        max_x = max_x.max(sx.saturating_add(mask.width as i64));
        max_y = max_y.max(sy.saturating_add(mask.height as i64));
    }
    let (width, height) = check_dimensions(
        max_x.saturating_sub(min_x),
        max_y.saturating_sub(min_y),
    )?;

    let mut layer = RgbaImage::new(width, height);
    if let Some((mask, sx, sy, color)) = &shadow {
        mask.paint(&mut layer, sx - min_x, sy - min_y, *color);
    }
    if let Some((mask, color)) = &stroke {
        mask.paint(&mut layer, -min_x, -min_y, *color);
    }
    fill.paint(&mut layer, -min_x, -min_y, spec.color);

    Ok(layer)
}

/// Size of the canvas needed to hold a `width` x `height` layer rotated by
/// `degrees`.
pub fn rotated_dimensions(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let radians = (degrees as f64).to_radians();
    let cos = radians.cos().abs();
    let sin = radians.sin().abs();
    let w = width as f64;
    let h = height as f64;

    // epsilon keeps exact right angles from growing by one pixel
    let rotated_w = (w * cos + h * sin - 1e-6).ceil().max(1.0) as u32;
    let rotated_h = (w * sin + h * cos - 1e-6).ceil().max(1.0) as u32;
    (rotated_w, rotated_h)
}

/// Rotate an image counter-clockwise about its center.
///
/// The canvas grows to hold the whole rotated image. Every angle goes
/// through the same inverse-mapped bilinear sampler, interpolating in
/// premultiplied space; samples outside the source are transparent.
pub fn rotate_layer(image: &RgbaImage, degrees: f32) -> RgbaImage {
    let (dst_w, dst_h) = rotated_dimensions(image.width(), image.height(), degrees);
    let mut rotated = RgbaImage::new(dst_w, dst_h);

    let radians = (degrees as f64).to_radians();
    let cos = radians.cos();
    let sin = radians.sin();

    let src_w = image.width() as i64;
    let src_h = image.height() as i64;
    let src_cx = image.width() as f64 / 2.0;
    let src_cy = image.height() as f64 / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let sample = |x: i64, y: i64| -> [f64; 4] {
        if x < 0 || y < 0 || x >= src_w || y >= src_h {
            return [0.0; 4];
        }
        let p = image.get_pixel(x as u32, y as u32);
        let a = p[3] as f64 / 255.0;
        [p[0] as f64 * a, p[1] as f64 * a, p[2] as f64 * a, a]
    };

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            // Pixel centers relative to the destination center.
            let rx = dx as f64 + 0.5 - dst_cx;
            let ry = dy as f64 + 0.5 - dst_cy;

            // Inverse of a counter-clockwise rotation in y-down coordinates.
            let sx = rx * cos - ry * sin + src_cx - 0.5;
            let sy = rx * sin + ry * cos + src_cy - 0.5;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;
            let x0 = x0 as i64;
            let y0 = y0 as i64;

            if x0 < -1 || y0 < -1 || x0 >= src_w || y0 >= src_h {
                continue;
            }

            let p00 = sample(x0, y0);
            let p10 = sample(x0 + 1, y0);
            let p01 = sample(x0, y0 + 1);
            let p11 = sample(x0 + 1, y0 + 1);

            let mut acc = [0.0f64; 4];
            for c in 0..4 {
                acc[c] = p00[c] * (1.0 - fx) * (1.0 - fy)
                    + p10[c] * fx * (1.0 - fy)
                    + p01[c] * (1.0 - fx) * fy
                    + p11[c] * fx * fy;
            }

            let alpha = acc[3];
            let out_alpha = (alpha * 255.0).round().clamp(0.0, 255.0) as u8;
            if out_alpha == 0 {
                continue;
            }

            let unpremultiply = |v: f64| (v / alpha).round().clamp(0.0, 255.0) as u8;
            rotated.put_pixel(
                dx,
                dy,
                Rgba([
                    unpremultiply(acc[0]),
                    unpremultiply(acc[1]),
                    unpremultiply(acc[2]),
                    out_alpha,
                ]),
            );
        }
    }

    rotated
}

/// Multiply every pixel's alpha by `opacity`.
pub fn apply_opacity(layer: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return;
    }
    for pixel in layer.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * opacity).round() as u8;
    }
}

/// Render the complete watermark layer: text, rotation and opacity.
pub fn render_layer(spec: &WatermarkSpec, font: &ResolvedFont) -> Result<RgbaImage, WatermarkError> {
    let text_layer = render_text(spec, font)?;
    let mut layer = rotate_layer(&text_layer, spec.normalized_rotation());
    apply_opacity(&mut layer, spec.opacity);
    Ok(layer)
}
