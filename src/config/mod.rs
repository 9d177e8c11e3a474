// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::batch::{ConflictPolicy, DestinationPolicy, NamingRule};
use crate::image_io::{OutputFormat, ResizeTo, DEFAULT_MAX_PIXELS};
use crate::templates::JsonTemplateStore;
use crate::watermark::WatermarkSpec;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{0}' is referenced but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Worker threads for batch export (0 = available parallelism)
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub export: ExportConfig,
    /// Watermark used when no template or command-line text is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkSpec>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "photomark=debug" (RUST_LOG wins)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplatesConfig {
    /// Template store file (default: <config dir>/photomark/templates.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl TemplatesConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(JsonTemplateStore::default_path)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FontsConfig {
    /// Extra directories searched for font families
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
    /// Also search the platform's font directories
    #[serde(default = "default_true")]
    pub include_platform_dirs: bool,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            include_platform_dirs: true,
        }
    }
}

fn default_quality() -> u8 {
    crate::batch::job::default_quality()
}

fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default = "default_true")]
    pub keep_original_name: bool,
    /// Force every output into this format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub conflict: ConflictPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeTo>,
    /// Decompression-bomb guard for source images
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            prefix: String::new(),
            suffix: String::new(),
            keep_original_name: true,
            format: None,
            quality: default_quality(),
            conflict: ConflictPolicy::default(),
            resize: None,
            max_pixels: default_max_pixels(),
        }
    }
}

impl ExportConfig {
    pub fn naming_rule(&self) -> NamingRule {
        NamingRule {
            keep_original_name: self.keep_original_name,
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            force_format: self.format,
        }
    }

    pub fn destination_policy(&self, output_root: impl Into<PathBuf>) -> DestinationPolicy {
        DestinationPolicy {
            output_root: output_root.into(),
            naming: self.naming_rule(),
            conflict: self.conflict,
            quality: self.quality,
            resize: self.resize,
        }
    }
}

impl AppConfig {
    /// Parse YAML after replacing `${VAR}` references with environment values.
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ConfigError> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| ConfigError::MissingEnvVar(var_name.to_string()))?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        // An empty document means "all defaults"
        if substituted.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&substituted)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Load `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level cannot be empty".to_string()));
        }

        if !(1..=100).contains(&self.export.quality) {
            return Err(ConfigError::Invalid(format!(
                "export.quality must be between 1 and 100, got {}",
                self.export.quality
            )));
        }

        if self.export.max_pixels == 0 {
            return Err(ConfigError::Invalid(
                "export.max_pixels must be positive".to_string(),
            ));
        }

        if let Some(resize) = &self.export.resize {
            resize
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("export.resize: {}", e)))?;
        }

        self.export
            .naming_rule()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("export: {}", e)))?;

        if let Some(spec) = &self.watermark {
            spec.validate()
                .map_err(|e| ConfigError::Invalid(format!("watermark: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::Anchor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml_with_env("").unwrap();
        assert_eq!(config.workers, 0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.fonts.include_platform_dirs);
        assert_eq!(config.export.quality, 90);
        assert_eq!(config.export.max_pixels, DEFAULT_MAX_PIXELS);
        assert!(config.export.keep_original_name);
        assert!(config.watermark.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config_parses() {
        let yaml = r##"
workers: 3
logging:
  level: photomark=debug
  format: json
templates:
  path: /tmp/templates.json
fonts:
  dirs: [/opt/fonts]
  include_platform_dirs: false
export:
  output_dir: /tmp/out
  prefix: wm_
  suffix: _final
  keep_original_name: false
  format: png
  quality: 75
  conflict: overwrite
  resize:
    max_width: 1920
  max_pixels: 50000000
watermark:
  text: "© Studio"
  font_size_pt: 32
  color: "#FF000080"
  anchor: top-left
"##;
        let config = AppConfig::from_yaml_with_env(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.templates.resolved_path(), Some(PathBuf::from("/tmp/templates.json")));
        assert_eq!(config.fonts.dirs, vec![PathBuf::from("/opt/fonts")]);

        let policy = config.export.destination_policy("/tmp/out");
        assert_eq!(policy.naming.prefix, "wm_");
        assert!(!policy.naming.keep_original_name);
        assert_eq!(policy.naming.force_format, Some(OutputFormat::Png));
        assert_eq!(policy.conflict, ConflictPolicy::Overwrite);
        assert_eq!(policy.quality, 75);
        assert_eq!(policy.resize, Some(ResizeTo::new(Some(1920), None)));

        let spec = config.watermark.unwrap();
        assert_eq!(spec.text, "© Studio");
        assert_eq!(spec.anchor, Anchor::TopLeft);
        assert_eq!(spec.color.a, 0x80);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PHOTOMARK_TEST_OUTPUT_DIR", "/data/exports");
        let config =
            AppConfig::from_yaml_with_env("export:\n  output_dir: ${PHOTOMARK_TEST_OUTPUT_DIR}\n")
                .unwrap();
        assert_eq!(config.export.output_dir, Some(PathBuf::from("/data/exports")));
    }

    #[test]
    fn test_missing_env_var_fails() {
        let err = AppConfig::from_yaml_with_env("workers: ${PHOTOMARK_TEST_SURELY_UNSET_VAR}")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "PHOTOMARK_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let config = AppConfig::from_yaml_with_env("export:\n  quality: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = AppConfig::from_yaml_with_env("watermark:\n  text: hi\n  opacity: 3\n").unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_yaml_with_env("export:\n  prefix: a/b\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = AppConfig::from_yaml_with_env("workers: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_can_be_loaded_from_file_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "workers: 2").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.workers, 2);

        let err = AppConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
