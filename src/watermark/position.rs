//! Position calculation for watermark placement.
//!
//! Grid anchors put the layer against the matching edge or center of the
//! image, inset by [`EDGE_MARGIN`] on every edge the anchor touches. Centered
//! axes get no inset. The spec offset is added afterwards as a nudge. For
//! [`Anchor::FreeOffset`] the offset is the absolute top-left corner.
//!
//! # Example
//!
//! ```
//! use photomark::watermark::position::{calculate_position, ImageDimensions, WatermarkDimensions};
//! use photomark::watermark::{Anchor, Offset};
//!
//! let image = ImageDimensions { width: 800, height: 600 };
//! let layer = WatermarkDimensions { width: 100, height: 50 };
//!
//! let pos = calculate_position(Anchor::BottomRight, Offset::default(), &image, &layer);
//! assert_eq!((pos.x, pos.y), (690, 540)); // 800 - 100 - 10, 600 - 50 - 10
//! ```

use super::config::{Anchor, Offset};

/// Fixed inset, in pixels, between a grid-anchored layer and the image edge.
pub const EDGE_MARGIN: u32 = 10;

/// Dimensions of the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimensions of the (rotated) watermark layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkDimensions {
    pub width: u32,
    pub height: u32,
}

/// Top-left corner of the layer in image coordinates.
///
/// May be negative or beyond the image; compositing clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Anchor position before the offset is applied.
fn anchor_origin(anchor: Anchor, image: &ImageDimensions, layer: &WatermarkDimensions) -> (i32, i32) {
    let img_w = image.width as i32;
    let img_h = image.height as i32;
    let wm_w = layer.width as i32;
    let wm_h = layer.height as i32;
    let m = EDGE_MARGIN as i32;

    let left = m;
    let h_center = (img_w - wm_w) / 2;
    let right = img_w - wm_w - m;
    let top = m;
    let v_center = (img_h - wm_h) / 2;
    let bottom = img_h - wm_h - m;

    match anchor {
        // Top row
        Anchor::TopLeft => (left, top),
        Anchor::TopCenter => (h_center, top),
        Anchor::TopRight => (right, top),

        // Middle row
        Anchor::MiddleLeft => (left, v_center),
        Anchor::Center => (h_center, v_center),
        Anchor::MiddleRight => (right, v_center),

        // Bottom row
        Anchor::BottomLeft => (left, bottom),
        Anchor::BottomCenter => (h_center, bottom),
        Anchor::BottomRight => (right, bottom),

        Anchor::FreeOffset => (0, 0),
    }
}

/// Calculate the layer's top-left corner.
///
/// Coordinates may be negative if the layer is larger than the image or the
/// offset pushes it out.
pub fn calculate_position(
    anchor: Anchor,
    offset: Offset,
    image: &ImageDimensions,
    layer: &WatermarkDimensions,
) -> PlacementPosition {
    let (x, y) = anchor_origin(anchor, image, layer);
    PlacementPosition::new(
        x.saturating_add(offset.dx.round() as i32),
        y.saturating_add(offset.dy.round() as i32),
    )
}

/// Check if a position is at least partially visible within the image.
pub fn is_visible(
    pos: &PlacementPosition,
    image: &ImageDimensions,
    layer: &WatermarkDimensions,
) -> bool {
    let wm_right = pos.x as i64 + layer.width as i64;
    let wm_bottom = pos.y as i64 + layer.height as i64;

    (pos.x as i64) < image.width as i64
        && (pos.y as i64) < image.height as i64
        && wm_right > 0
        && wm_bottom > 0
}
