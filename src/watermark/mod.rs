//! Watermark module for compositing text watermarks onto images.
//!
//! The [`Renderer`] is a pure function of a source bitmap and a
//! [`WatermarkSpec`]: it lays the text out with an injected
//! [`FontResolver`], rasterizes shadow, stroke and fill into a transparent
//! layer, rotates the layer, applies opacity, anchors it on the image and
//! alpha-blends it onto a copy of the source.
//!
//! # Features
//!
//! - **Text layers** with shadow, outline stroke, synthetic bold/italic and
//!   multi-line text
//! - **10 placement modes**: 9-grid anchors with a fixed edge margin plus
//!   free offset
//! - **Arbitrary rotation** counter-clockwise about the layer center
//! - **Per-image placeholders** (`{{filename}}`, `{{index}}`, ...)
//!
//! # Example
//!
//! ```
//! use photomark::watermark::{Renderer, WatermarkSpec};
//! use image::{DynamicImage, RgbaImage};
//!
//! let source = DynamicImage::ImageRgba8(RgbaImage::new(200, 100));
//! let spec = WatermarkSpec::with_text("© Studio");
//! let result = Renderer::default().render(&source, &spec).unwrap();
//! assert_eq!((result.width(), result.height()), (200, 100));
//! ```

pub mod compositor;
pub mod config;
pub mod error;
pub mod font;
pub mod position;
pub mod renderer;
pub mod text_renderer;
pub mod text_template;

// Re-export main types for convenience
pub use compositor::{blend_layer, blend_over, composite_onto, Region, WatermarkLayer};
pub use config::{parse_hex_color, Anchor, Color, Offset, Shadow, Stroke, WatermarkSpec};
pub use error::{ValidationError, WatermarkError};
pub use font::{
    builtin_font, BuiltinFontResolver, FontRequest, FontResolver, ResolvedFont,
    SystemFontResolver,
};
pub use position::{calculate_position, ImageDimensions, PlacementPosition, EDGE_MARGIN};
pub use renderer::Renderer;
pub use text_renderer::{
    measure_text, render_layer, rotate_layer, TextMetrics, MAX_EFFECT_RADIUS,
};
pub use text_template::{resolve_template, TextContext};
