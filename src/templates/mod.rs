//! Named, persisted watermark templates.
//!
//! A template is a [`WatermarkSpec`] saved under a unique name. Saving under
//! an existing name replaces it. Stores also remember the most recently
//! saved or loaded template so a front end can restore it on start-up.

pub mod error;
pub mod json_store;
pub mod memory_store;

pub use error::TemplateError;
pub use json_store::JsonTemplateStore;
pub use memory_store::MemoryTemplateStore;

use crate::watermark::{Anchor, Color, Shadow, Stroke, WatermarkSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name of the template seeded into a fresh store.
pub const DEFAULT_TEMPLATE_NAME: &str = "Default";

/// A named watermark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub spec: WatermarkSpec,
}

/// Key-value persistence for templates.
pub trait TemplateStore: Send + Sync {
    /// Save `spec` under `name`, replacing any existing template.
    fn save(&self, name: &str, spec: &WatermarkSpec) -> Result<(), TemplateError>;

    /// Load the template named `name`.
    fn load(&self, name: &str) -> Result<WatermarkSpec, TemplateError>;

    /// Names of all stored templates.
    fn list(&self) -> Result<BTreeSet<String>, TemplateError>;

    /// Remove `name`. Removing a template that does not exist is not an error.
    fn delete(&self, name: &str) -> Result<(), TemplateError>;

    /// Most recently saved or loaded template, if any.
    fn last_used(&self) -> Option<String>;
}

/// Spec of the template seeded into a fresh store.
pub fn default_template_spec() -> WatermarkSpec {
    WatermarkSpec {
        text: "© All rights reserved".to_string(),
        font_size_pt: 40.0,
        color: Color::rgba(255, 255, 255, 200),
        opacity: 0.8,
        shadow: Some(Shadow {
            offset_x: 2.0,
            offset_y: 2.0,
            color: Color::rgba(0, 0, 0, 160),
            blur_radius: 2.0,
        }),
        stroke: Some(Stroke {
            width: 2.0,
            color: Color::black(),
        }),
        anchor: Anchor::BottomRight,
        ..WatermarkSpec::default()
    }
}

/// Reject names that cannot round-trip through a store.
pub fn validate_name(name: &str) -> Result<(), TemplateError> {
    let invalid = |reason: &str| TemplateError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.trim() != name {
        return Err(invalid("must not start or end with whitespace"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_is_valid() {
        let spec = default_template_spec();
        spec.validate().unwrap();
        assert!(!spec.is_noop());
        assert_eq!(spec.anchor, Anchor::BottomRight);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Holiday 2025").is_ok());
        assert!(validate_name("日本語").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(" padded").is_err());
        assert!(validate_name("tab\there").is_err());
    }
}
