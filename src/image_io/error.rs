//! Image I/O error types
//!
//! Structured errors for decoding sources and encoding exports.

use std::fmt;

/// Errors that can occur while reading or writing image files
#[derive(Debug, Clone)]
pub enum ImageIoError {
    // === Decoding Errors ===
    /// Image or output format is not supported
    UnsupportedFormat { format: String },
    /// Failed to read or write the file itself
    Io { path: String, message: String },
    /// Failed to decode image data
    DecodeFailed { message: String },
    /// Image dimensions exceed safety limits (image bomb protection)
    ImageBombDetected {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    // === Processing Errors ===
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to output format failed
    EncodeFailed { format: String, message: String },

    // === Parameter Errors ===
    /// Quality value out of range
    InvalidQuality { quality: u8 },
}

impl fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageIoError::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            ImageIoError::Io { path, message } => {
                write!(f, "I/O error on {}: {}", path, message)
            }
            ImageIoError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageIoError::ImageBombDetected {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
            ImageIoError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageIoError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageIoError::InvalidQuality { quality } => {
                write!(f, "Invalid quality {}: must be 1-100", quality)
            }
        }
    }
}

impl std::error::Error for ImageIoError {}

impl ImageIoError {
    /// Helper constructors for common error patterns
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageIoError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        ImageIoError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageIoError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageIoError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageIoError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn image_bomb(width: u32, height: u32, max_pixels: u64) -> Self {
        ImageIoError::ImageBombDetected {
            width,
            height,
            pixels: width as u64 * height as u64,
            max_pixels,
        }
    }

    /// Whether the error happened while producing the output file.
    pub fn is_encode_side(&self) -> bool {
        matches!(
            self,
            ImageIoError::EncodeFailed { .. } | ImageIoError::InvalidQuality { .. }
        )
    }
}
