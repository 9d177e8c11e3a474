//! Image file I/O for the export pipeline.
//!
//! [`ImageIo`] is the seam between the batch pipeline and the file system:
//! decode a source path into a bitmap and encode a bitmap to a destination
//! path. [`FsImageIo`] is the production implementation.
//!
//! Decoding accepts JPEG, PNG, BMP, TIFF, WebP and GIF; encoding produces
//! JPEG, PNG, BMP or TIFF.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod resize;

pub use decoder::{apply_orientation, decode_bytes, DecodeOptions, DEFAULT_MAX_PIXELS};
pub use encoder::{EncoderFactory, EncoderQuality, ImageEncoder};
pub use error::ImageIoError;
pub use format::{is_supported_input, OutputFormat, SUPPORTED_INPUT_EXTENSIONS};
pub use resize::{fit_within, ResizeTo};

use image::DynamicImage;
use std::fs;
use std::path::Path;
use tracing::instrument;

/// Reads source images and writes exports.
pub trait ImageIo: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ImageIoError>;

    fn encode(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: OutputFormat,
        quality: EncoderQuality,
    ) -> Result<(), ImageIoError>;
}

/// File-system backed [`ImageIo`].
#[derive(Debug, Clone, Default)]
pub struct FsImageIo {
    options: DecodeOptions,
}

impl FsImageIo {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self::new(DecodeOptions {
            max_pixels,
            ..DecodeOptions::default()
        })
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
}

impl ImageIo for FsImageIo {
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    fn decode(&self, path: &Path) -> Result<DynamicImage, ImageIoError> {
        let data = fs::read(path).map_err(|e| ImageIoError::io(path, &e))?;
        decode_bytes(&data, &self.options)
    }

    #[instrument(level = "debug", skip(self, image), fields(path = %path.display(), format = %format))]
    fn encode(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: OutputFormat,
        quality: EncoderQuality,
    ) -> Result<(), ImageIoError> {
        let rgba = image.to_rgba8();
        let data = EncoderFactory::create(format).encode(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            quality,
        )?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ImageIoError::io(parent, &e))?;
        }
        fs::write(path, data).map_err(|e| ImageIoError::io(path, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(6, 4, |x, y| {
            Rgba([x as u8 * 40, y as u8 * 60, 90, 255])
        }))
    }

    #[test]
    fn test_png_write_then_read_is_lossless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.png");
        let io = FsImageIo::default();

        io.encode(&sample(), &path, OutputFormat::Png, EncoderQuality::default())
            .unwrap();
        let decoded = io.decode(&path).unwrap();
        assert_eq!(decoded.to_rgba8(), sample().to_rgba8());
    }

    #[test]
    fn test_jpeg_export_decodes_with_same_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        let io = FsImageIo::default();

        io.encode(&sample(), &path, OutputFormat::Jpeg, EncoderQuality::with_quality(80))
            .unwrap();
        let decoded = io.decode(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[test]
    fn test_decode_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = FsImageIo::default().decode(&dir.path().join("missing.png"));
        assert!(matches!(result, Err(ImageIoError::Io { .. })));
    }

    #[test]
    fn test_decode_non_image_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();
        let result = FsImageIo::default().decode(&path);
        assert!(matches!(result, Err(ImageIoError::DecodeFailed { .. })));
    }

    #[test]
    fn test_encode_into_file_path_parent_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let result = FsImageIo::default().encode(
            &sample(),
            &blocker.join("out.png"),
            OutputFormat::Png,
            EncoderQuality::default(),
        );
        assert!(matches!(result, Err(ImageIoError::Io { .. })));
    }

    #[test]
    fn test_max_pixels_is_applied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        let io = FsImageIo::default();
        io.encode(&sample(), &path, OutputFormat::Png, EncoderQuality::default())
            .unwrap();

        let strict = FsImageIo::with_max_pixels(10);
        assert!(matches!(
            strict.decode(&path),
            Err(ImageIoError::ImageBombDetected { .. })
        ));
    }
}
