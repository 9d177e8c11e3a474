//! Per-image placeholder substitution for watermark text.
//!
//! Batch exports can stamp each image with its own name or sequence number
//! by using `{{variable}}` placeholders in the watermark text.
//!
//! # Supported Variables
//!
//! - `{{filename}}` - Source file name with extension
//! - `{{stem}}` - Source file name without extension
//! - `{{ext}}` - Source extension, lowercased
//! - `{{index}}` - 1-based position in the batch
//! - `{{total}}` - Number of images in the batch
//! - `{{date}}` - Current date (YYYY-MM-DD)
//! - `{{datetime}}` - ISO 8601 datetime
//! - `{{timestamp}}` - Unix timestamp
//!
//! # Example
//!
//! ```
//! use photomark::watermark::text_template::{resolve_template, TextContext};
//!
//! let context = TextContext::for_item("/photos/beach.jpg".as_ref(), 2, 10);
//! assert_eq!(resolve_template("{{stem}} ({{index}}/{{total}})", &context), "beach (3/10)");
//! ```

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Regex pattern for matching template variables: {{variable}}
static TEMPLATE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Gets the compiled template pattern regex.
///
/// The pattern is a constant; `test_template_regex_is_valid` guards the
/// `expect`.
fn get_template_pattern() -> &'static Regex {
    TEMPLATE_PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("Invalid template regex - this is a compile-time bug")
    })
}

/// Values available for placeholder substitution.
#[derive(Debug, Clone, Default)]
pub struct TextContext {
    filename: Option<String>,
    stem: Option<String>,
    extension: Option<String>,
    index: Option<usize>,
    total: Option<usize>,
    /// Fixed timestamp for deterministic output (if None, uses current time)
    timestamp: Option<i64>,
}

impl TextContext {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for the item at zero-based `index` of a batch of `total`.
    pub fn for_item(path: &Path, index: usize, total: usize) -> Self {
        let mut context = Self::new();
        context.set_path(path);
        context.index = Some(index + 1);
        context.total = Some(total);
        context
    }

    /// Sets filename, stem and extension from a path.
    pub fn set_path(&mut self, path: &Path) {
        self.filename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned());
        self.stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        self.extension = path
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase());
    }

    /// Pins the clock used by the time placeholders.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = Some(timestamp);
    }

    fn current_timestamp(&self) -> i64 {
        self.timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }
}

/// Whether `text` contains any `{{variable}}` placeholder.
pub fn has_placeholders(text: &str) -> bool {
    get_template_pattern().is_match(text)
}

/// Resolves all placeholders in `template`.
///
/// Unknown variables or variables without a value become empty strings.
pub fn resolve_template(template: &str, context: &TextContext) -> String {
    get_template_pattern()
        .replace_all(template, |caps: &regex::Captures| {
            resolve_variable(&caps[1], context)
        })
        .into_owned()
}

fn resolve_variable(var_name: &str, context: &TextContext) -> String {
    match var_name {
        "filename" => context.filename.clone().unwrap_or_default(),
        "stem" => context.stem.clone().unwrap_or_default(),
        "ext" => context.extension.clone().unwrap_or_default(),
        "index" => context.index.map(|i| i.to_string()).unwrap_or_default(),
        "total" => context.total.map(|t| t.to_string()).unwrap_or_default(),
        "date" => format_timestamp(context.current_timestamp(), "%Y-%m-%d"),
        "datetime" => format_timestamp(context.current_timestamp(), "%Y-%m-%dT%H:%M:%SZ"),
        "timestamp" => context.current_timestamp().to_string(),
        _ => String::new(),
    }
}

fn format_timestamp(timestamp: i64, format: &str) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_regex_is_valid() {
        let pattern = get_template_pattern();
        assert!(pattern.is_match("{{filename}}"));
        assert!(pattern.is_match("{{ stem }}"));
        assert!(!pattern.is_match("plain text"));
        assert!(!pattern.is_match("{single}"));
    }

    #[test]
    fn test_resolve_file_placeholders() {
        let context = TextContext::for_item(Path::new("/in/Holiday.JPG"), 0, 4);
        assert_eq!(
            resolve_template("{{filename}} | {{stem}} | {{ext}}", &context),
            "Holiday.JPG | Holiday | jpg"
        );
        assert_eq!(resolve_template("{{index}} of {{total}}", &context), "1 of 4");
    }

    #[test]
    fn test_resolve_time_placeholders() {
        let mut context = TextContext::new();
        // 2025-12-24 10:30:00 UTC
        context.set_timestamp(1766572200);

        assert_eq!(resolve_template("{{date}}", &context), "2025-12-24");
        assert_eq!(
            resolve_template("{{datetime}}", &context),
            "2025-12-24T10:30:00Z"
        );
        assert_eq!(resolve_template("{{timestamp}}", &context), "1766572200");
    }

    #[test]
    fn test_unknown_or_missing_values_become_empty() {
        let context = TextContext::new();
        assert_eq!(resolve_template("[{{nope}}]", &context), "[]");
        assert_eq!(resolve_template("[{{filename}}]", &context), "[]");
    }

    #[test]
    fn test_text_without_placeholders_is_unchanged() {
        let context = TextContext::for_item(Path::new("a.png"), 0, 1);
        let text = "© 2025 Studio {not a placeholder}";
        assert!(!has_placeholders(text));
        assert_eq!(resolve_template(text, &context), text);
        assert_eq!(resolve_template("", &context), "");
    }

    #[test]
    fn test_adjacent_placeholders() {
        let context = TextContext::for_item(Path::new("img.png"), 9, 10);
        assert_eq!(resolve_template("{{stem}}{{index}}", &context), "img10");
    }
}
