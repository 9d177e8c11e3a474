//! Watermark error types.
//!
//! Defines errors that can occur while validating a watermark specification
//! or rendering it onto an image.

use std::fmt;

/// A watermark specification field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field (e.g. `opacity`, `shadow.blur_radius`).
    pub field: String,
    /// Human readable reason.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Errors that can occur during watermark rendering.
#[derive(Debug)]
pub enum WatermarkError {
    /// No usable font could be loaded for the requested family or file
    FontResolution(String),

    /// Source image cannot be watermarked (e.g. zero width or height)
    InvalidImage(String),

    /// Failed to rasterize the text layer
    RenderError(String),

    /// Specification rejected before rendering
    Validation(ValidationError),
}

impl fmt::Display for WatermarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FontResolution(msg) => write!(f, "Failed to resolve font: {}", msg),
            Self::InvalidImage(msg) => write!(f, "Invalid source image: {}", msg),
            Self::RenderError(msg) => write!(f, "Failed to render text watermark: {}", msg),
            Self::Validation(err) => write!(f, "Watermark specification error: {}", err),
        }
    }
}

impl std::error::Error for WatermarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for WatermarkError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl WatermarkError {
    /// Whether the error came from font lookup rather than rasterization.
    pub fn is_font_resolution(&self) -> bool {
        matches!(self, Self::FontResolution(_))
    }
}
