//! Pure watermark renderer.
//!
//! `Renderer::render` takes a source bitmap and a [`WatermarkSpec`] and
//! returns a new bitmap with the watermark composited. It performs no I/O
//! beyond what the injected [`FontResolver`] does and never mutates the
//! source.

use super::compositor::{composite_onto, Region, WatermarkLayer};
use super::config::WatermarkSpec;
use super::font::{builtin_font, BuiltinFontResolver, FontRequest, FontResolver, ResolvedFont};
use super::position::{calculate_position, is_visible, ImageDimensions, WatermarkDimensions};
use super::text_renderer::render_layer;
use super::WatermarkError;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Composites text watermarks onto images.
#[derive(Clone)]
pub struct Renderer {
    fonts: Arc<dyn FontResolver>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinFontResolver))
    }
}

impl Renderer {
    pub fn new(fonts: Arc<dyn FontResolver>) -> Self {
        Self { fonts }
    }

    /// Resolve the face for `spec` through the injected resolver.
    pub fn resolve_font(&self, spec: &WatermarkSpec) -> Result<ResolvedFont, WatermarkError> {
        self.fonts.resolve(&FontRequest {
            family: spec.font_family.as_deref(),
            file: spec.font_file.as_deref(),
            bold: spec.bold,
            italic: spec.italic,
        })
    }

    /// Render `spec` onto a copy of `source`.
    ///
    /// Fails with [`WatermarkError::FontResolution`] when the requested face
    /// cannot be loaded; callers may retry with [`Renderer::render_with_builtin_font`].
    #[instrument(level = "debug", skip_all, fields(width = source.width(), height = source.height()))]
    pub fn render(
        &self,
        source: &DynamicImage,
        spec: &WatermarkSpec,
    ) -> Result<DynamicImage, WatermarkError> {
        check_source(source)?;
        spec.validate()?;
        if spec.is_noop() {
            return Ok(source.clone());
        }

        let font = self.resolve_font(spec)?;
        self.composite(source, spec, &font)
    }

    /// Render with the embedded default face, ignoring the spec's font
    /// selection. Requested bold/italic are synthesized.
    pub fn render_with_builtin_font(
        &self,
        source: &DynamicImage,
        spec: &WatermarkSpec,
    ) -> Result<DynamicImage, WatermarkError> {
        let font = builtin_font()?;
        self.render_with_font(source, spec, &font)
    }

    /// Render with an already resolved face.
    pub fn render_with_font(
        &self,
        source: &DynamicImage,
        spec: &WatermarkSpec,
        font: &ResolvedFont,
    ) -> Result<DynamicImage, WatermarkError> {
        check_source(source)?;
        spec.validate()?;
        if spec.is_noop() {
            return Ok(source.clone());
        }
        self.composite(source, spec, font)
    }

    /// Build the positioned layer `spec` would produce on a `width` x `height`
    /// image, without compositing it.
    pub fn layer_for(
        &self,
        width: u32,
        height: u32,
        spec: &WatermarkSpec,
        font: &ResolvedFont,
    ) -> Result<WatermarkLayer, WatermarkError> {
        let image = render_layer(spec, font)?;
        let position = calculate_position(
            spec.anchor,
            spec.offset,
            &ImageDimensions { width, height },
            &WatermarkDimensions {
                width: image.width(),
                height: image.height(),
            },
        );
        Ok(WatermarkLayer { image, position })
    }

    fn composite(
        &self,
        source: &DynamicImage,
        spec: &WatermarkSpec,
        font: &ResolvedFont,
    ) -> Result<DynamicImage, WatermarkError> {
        let layer = self.layer_for(source.width(), source.height(), spec, font)?;
        let image_dims = ImageDimensions {
            width: source.width(),
            height: source.height(),
        };
        let layer_dims = WatermarkDimensions {
            width: layer.image.width(),
            height: layer.image.height(),
        };

        if !is_visible(&layer.position, &image_dims, &layer_dims) {
            debug!(x = layer.position.x, y = layer.position.y, "Watermark falls outside the image");
            return Ok(source.clone());
        }

        let mut target = source.clone();
        let region: Option<Region> = composite_onto(&mut target, &layer);
        debug!(font = %font.name, ?region, color = ?source.color(), "Composited watermark layer");

        Ok(target)
    }
}

fn check_source(source: &DynamicImage) -> Result<(), WatermarkError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(WatermarkError::InvalidImage(format!(
            "source image has zero size ({}x{})",
            source.width(),
            source.height()
        )));
    }
    Ok(())
}
