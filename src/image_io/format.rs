//! Image formats accepted on input and produced on output.

use super::error::ImageIoError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Extensions the batch pipeline picks up from source directories.
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp", "gif"];

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// Output format implied by a file extension, if it is one we write.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Output format implied by a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, ImageIoError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ImageIoError::unsupported_format(path.display().to_string()))?;
        Self::from_extension(ext).ok_or_else(|| ImageIoError::unsupported_format(ext))
    }

    /// Whether the format keeps an alpha channel.
    pub fn supports_transparency(&self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ImageIoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| ImageIoError::unsupported_format(s))
    }
}

/// Whether `path` has an extension the decoder accepts.
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_INPUT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("jpg", OutputFormat::Jpeg)]
    #[case("JPEG", OutputFormat::Jpeg)]
    #[case("png", OutputFormat::Png)]
    #[case("bmp", OutputFormat::Bmp)]
    #[case("tif", OutputFormat::Tiff)]
    #[case("tiff", OutputFormat::Tiff)]
    fn test_from_str(#[case] input: &str, #[case] expected: OutputFormat) {
        assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!("webp".parse::<OutputFormat>().is_err());
        assert!("".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            OutputFormat::from_path(Path::new("/out/photo.PNG")).unwrap(),
            OutputFormat::Png
        );
        assert!(OutputFormat::from_path(Path::new("/out/photo")).is_err());
        assert!(OutputFormat::from_path(Path::new("/out/photo.gif")).is_err());
    }

    #[test]
    fn test_extension_round_trips() {
        for format in [
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::Bmp,
            OutputFormat::Tiff,
        ] {
            assert_eq!(OutputFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_is_supported_input() {
        assert!(is_supported_input(Path::new("a.jpg")));
        assert!(is_supported_input(Path::new("a.WebP")));
        assert!(is_supported_input(Path::new("dir/a.tif")));
        assert!(!is_supported_input(Path::new("notes.txt")));
        assert!(!is_supported_input(Path::new("README")));
    }

    #[test]
    fn test_transparency_support() {
        assert!(!OutputFormat::Jpeg.supports_transparency());
        assert!(OutputFormat::Png.supports_transparency());
    }

    #[test]
    fn test_serde_lowercase() {
        let format: OutputFormat = serde_yaml::from_str("tiff").unwrap();
        assert_eq!(format, OutputFormat::Tiff);
        assert_eq!(serde_json::to_string(&OutputFormat::Jpeg).unwrap(), "\"jpeg\"");
    }
}
