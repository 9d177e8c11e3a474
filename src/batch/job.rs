//! Batch job description.

use crate::image_io::{EncoderQuality, OutputFormat, ResizeTo};
use crate::watermark::WatermarkSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::error::BatchError;

/// How output file names are derived from source file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingRule {
    /// Keep the source stem; otherwise items are numbered `image_0001`, ...
    #[serde(default = "default_keep_original_name")]
    pub keep_original_name: bool,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Encode every item in this format instead of the source's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_format: Option<OutputFormat>,
}

fn default_keep_original_name() -> bool {
    true
}

impl Default for NamingRule {
    fn default() -> Self {
        Self {
            keep_original_name: default_keep_original_name(),
            prefix: String::new(),
            suffix: String::new(),
            force_format: None,
        }
    }
}

impl NamingRule {
    pub fn validate(&self) -> Result<(), BatchError> {
        for (field, value) in [("prefix", &self.prefix), ("suffix", &self.suffix)] {
            if value.contains(['/', '\\']) {
                return Err(BatchError::InvalidOptions(format!(
                    "{} must not contain path separators: {:?}",
                    field, value
                )));
            }
            if value.chars().any(char::is_control) {
                return Err(BatchError::InvalidOptions(format!(
                    "{} must not contain control characters",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// What to do when a planned output file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Append `_1`, `_2`, ... to the stem until the name is free.
    #[default]
    AutoRename,
}

/// Where and how a batch writes its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationPolicy {
    pub output_root: PathBuf,
    #[serde(default)]
    pub naming: NamingRule,
    #[serde(default)]
    pub conflict: ConflictPolicy,
    /// JPEG quality, 1-100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeTo>,
}

pub(crate) fn default_quality() -> u8 {
    EncoderQuality::default().quality
}

impl DestinationPolicy {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            naming: NamingRule::default(),
            conflict: ConflictPolicy::default(),
            quality: default_quality(),
            resize: None,
        }
    }

    /// Validate output options.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.output_root.as_os_str().is_empty() {
            return Err(BatchError::InvalidOptions(
                "output directory must not be empty".to_string(),
            ));
        }
        EncoderQuality::try_new(self.quality)
            .map_err(|e| BatchError::InvalidOptions(e.to_string()))?;
        if let Some(resize) = &self.resize {
            resize.validate().map_err(BatchError::InvalidOptions)?;
        }
        self.naming.validate()
    }

    pub fn encoder_quality(&self) -> EncoderQuality {
        EncoderQuality::with_quality(self.quality)
    }
}

/// One export run: sources, the watermark to apply, and where to write.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: String,
    pub sources: Vec<PathBuf>,
    pub spec: WatermarkSpec,
    pub destination: DestinationPolicy,
}

impl BatchJob {
    pub fn new(sources: Vec<PathBuf>, spec: WatermarkSpec, destination: DestinationPolicy) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sources,
            spec,
            destination,
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
