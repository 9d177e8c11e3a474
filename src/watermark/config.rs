//! Watermark specification types.
//!
//! A [`WatermarkSpec`] is an immutable value describing one text watermark:
//! the text, font selection, color, opacity, rotation, optional shadow and
//! stroke, and where the layer is anchored on the target image.
//!
//! ```yaml
//! text: "© Studio North"
//! font_family: DejaVu Sans
//! font_size_pt: 36
//! color: "#FFFFFF"
//! opacity: 0.6
//! rotation_degrees: 30
//! shadow:
//!   offset_x: 2
//!   offset_y: 2
//!   color: "#00000099"
//!   blur_radius: 3
//! anchor: bottom-right
//! offset: { dx: -4, dy: 0 }
//! ```

use super::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// Default values
fn default_font_size() -> f32 {
    24.0
}

fn default_color() -> Color {
    Color::white()
}

fn default_opacity() -> f32 {
    0.5
}

fn default_anchor() -> Anchor {
    Anchor::BottomRight
}

/// RGBA color, 0-255 per channel.
///
/// Serialized as a hex string (`#RGB`, `#RRGGBB` or `#RRGGBBAA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black color.
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Hex representation; the alpha pair is omitted when fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02X}{:02X}{:02X}{:02X}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_hex_color(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Parse a hex color string.
///
/// Supports `#RGB`, `#RRGGBB` and `#RRGGBBAA`.
pub fn parse_hex_color(hex: &str) -> Result<Color, ValidationError> {
    let digits = hex
        .strip_prefix('#')
        .ok_or_else(|| ValidationError::new("color", "must start with '#'"))?;

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::new(
            "color",
            format!("invalid hex digit in '{}'", hex),
        ));
    }

    let pair = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
    let parsed = match digits.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).map(|v| v * 17);
            (nibble(0), nibble(1), nibble(2), Ok(255))
        }
        6 => (pair(0), pair(2), pair(4), Ok(255)),
        8 => (pair(0), pair(2), pair(4), pair(6)),
        n => {
            return Err(ValidationError::new(
                "color",
                format!("must be #RGB, #RRGGBB or #RRGGBBAA, got {} digits", n),
            ))
        }
    };

    match parsed {
        (Ok(r), Ok(g), Ok(b), Ok(a)) => Ok(Color::rgba(r, g, b, a)),
        _ => Err(ValidationError::new(
            "color",
            format!("invalid hex color '{}'", hex),
        )),
    }
}

/// Where the watermark layer is placed on the target image.
///
/// The nine grid anchors touch the matching edge or center of the image
/// (inset by a fixed margin); `FreeOffset` places the layer's top-left
/// corner exactly at the spec offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    FreeOffset,
}

impl Anchor {
    pub const ALL: [Anchor; 10] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::Center,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
        Anchor::FreeOffset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::MiddleLeft => "middle-left",
            Self::Center => "center",
            Self::MiddleRight => "middle-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
            Self::FreeOffset => "free-offset",
        }
    }
}

impl std::str::FromStr for Anchor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Anchor::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| ValidationError::new("anchor", format!("unknown anchor '{}'", s)))
    }
}

/// Pixel offset relative to the anchor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    #[serde(default)]
    pub dx: f32,
    #[serde(default)]
    pub dy: f32,
}

impl Offset {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

/// Drop shadow drawn beneath the text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    #[serde(default)]
    pub offset_x: f32,
    #[serde(default)]
    pub offset_y: f32,
    pub color: Color,
    /// Gaussian blur sigma in pixels; 0 draws a hard shadow.
    #[serde(default)]
    pub blur_radius: f32,
}

/// Outline drawn around each glyph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub width: f32,
    pub color: Color,
}

/// Complete description of a text watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    /// Text to draw. Empty text renders nothing.
    #[serde(default)]
    pub text: String,

    /// Font family name, looked up by the font resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    /// Explicit TTF/OTF file; wins over `font_family` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_file: Option<PathBuf>,

    /// Font size in points (1pt renders as 1px)
    #[serde(default = "default_font_size")]
    pub font_size_pt: f32,

    #[serde(default)]
    pub bold: bool,

    #[serde(default)]
    pub italic: bool,

    #[serde(default = "default_color")]
    pub color: Color,

    /// Opacity from 0.0 (transparent) to 1.0 (opaque); multiplies `color.a`
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Counter-clockwise rotation in degrees
    #[serde(default)]
    pub rotation_degrees: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,

    #[serde(default = "default_anchor")]
    pub anchor: Anchor,

    #[serde(default)]
    pub offset: Offset,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: None,
            font_file: None,
            font_size_pt: default_font_size(),
            bold: false,
            italic: false,
            color: default_color(),
            opacity: default_opacity(),
            rotation_degrees: 0.0,
            shadow: None,
            stroke: None,
            anchor: default_anchor(),
            offset: Offset::default(),
        }
    }
}

impl WatermarkSpec {
    /// Convenience constructor for a spec with defaults and the given text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Rotation folded into `[0, 360)`.
    pub fn normalized_rotation(&self) -> f32 {
        let r = self.rotation_degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if r >= 360.0 {
            0.0
        } else {
            r
        }
    }

    /// Copy of the spec with rotation normalized into `[0, 360)`.
    pub fn normalized(&self) -> Self {
        Self {
            rotation_degrees: self.normalized_rotation(),
            ..self.clone()
        }
    }

    /// Whether rendering this spec would leave the image untouched.
    pub fn is_noop(&self) -> bool {
        self.text.is_empty()
    }

    /// Validate the specification.
    ///
    /// Checked before any batch starts; a spec that passes here never
    /// fails rendering for reasons other than font lookup or image state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(ValidationError::new(
                "opacity",
                format!(
                    "must be a finite value between 0.0 and 1.0, got {}",
                    self.opacity
                ),
            ));
        }

        if !self.font_size_pt.is_finite() || self.font_size_pt <= 0.0 {
            return Err(ValidationError::new(
                "font_size_pt",
                format!("must be a finite positive value, got {}", self.font_size_pt),
            ));
        }

        if !self.rotation_degrees.is_finite() {
            return Err(ValidationError::new(
                "rotation_degrees",
                format!("must be finite, got {}", self.rotation_degrees),
            ));
        }

        if !self.offset.dx.is_finite() || !self.offset.dy.is_finite() {
            return Err(ValidationError::new("offset", "must be finite"));
        }

        if let Some(family) = &self.font_family {
            if family.trim().is_empty() {
                return Err(ValidationError::new(
                    "font_family",
                    "cannot be empty when set",
                ));
            }
        }

        if let Some(file) = &self.font_file {
            if file.as_os_str().is_empty() {
                return Err(ValidationError::new("font_file", "cannot be empty when set"));
            }
        }

        if let Some(shadow) = &self.shadow {
            if !shadow.blur_radius.is_finite() || shadow.blur_radius < 0.0 {
                return Err(ValidationError::new(
                    "shadow.blur_radius",
                    format!("must be finite and >= 0, got {}", shadow.blur_radius),
                ));
            }
            if !shadow.offset_x.is_finite() || !shadow.offset_y.is_finite() {
                return Err(ValidationError::new("shadow.offset", "must be finite"));
            }
        }

        if let Some(stroke) = &self.stroke {
            if !stroke.width.is_finite() || stroke.width < 0.0 {
                return Err(ValidationError::new(
                    "stroke.width",
                    format!("must be finite and >= 0, got {}", stroke.width),
                ));
            }
        }

        Ok(())
    }
}
