//! Source image decoding.
//!
//! Decoding sniffs the format from the file content, checks the declared
//! dimensions against a pixel budget before allocating the bitmap, and
//! applies the EXIF orientation tag so the watermark lands upright on
//! camera photos.

use super::error::ImageIoError;
use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Default pixel budget (100 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Decode options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject images with more pixels than this.
    pub max_pixels: u64,
    /// Rotate/flip according to the EXIF orientation tag.
    pub apply_exif_orientation: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            apply_exif_orientation: true,
        }
    }
}

/// Decode an in-memory image file.
pub fn decode_bytes(data: &[u8], options: &DecodeOptions) -> Result<DynamicImage, ImageIoError> {
    let (width, height) = reader(data)?
        .into_dimensions()
        .map_err(|e| ImageIoError::decode_failed(e.to_string()))?;
    check_dimensions(width, height, options.max_pixels)?;

    let img = reader(data)?
        .decode()
        .map_err(|e| ImageIoError::decode_failed(e.to_string()))?;

    if !options.apply_exif_orientation {
        return Ok(img);
    }

    let orientation = read_orientation(data);
    if orientation != 1 {
        debug!(orientation, "Applying EXIF orientation");
    }
    Ok(apply_orientation(img, orientation))
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImageIoError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageIoError::decode_failed(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ImageIoError::decode_failed("unrecognized image data"));
    }
    Ok(reader)
}

/// Reject images whose pixel count exceeds `max_pixels`.
pub fn check_dimensions(width: u32, height: u32, max_pixels: u64) -> Result<(), ImageIoError> {
    if width == 0 || height == 0 {
        return Err(ImageIoError::decode_failed(format!(
            "image has zero size ({}x{})",
            width, height
        )));
    }
    if width as u64 * height as u64 > max_pixels {
        return Err(ImageIoError::image_bomb(width, height, max_pixels));
    }
    Ok(())
}

/// EXIF orientation tag value (1-8), or 1 when absent or unreadable.
pub fn read_orientation(data: &[u8]) -> u32 {
    let mut cursor = Cursor::new(data);
    exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

/// Transform `img` so that an image tagged with `orientation` displays
/// upright.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
