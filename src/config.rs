//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `picture-pipe.toml`. Stock
//! defaults form the base layer; a user file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # Transformers to run, in order. Each may appear more than once.
//! # "srcset"         - rewrite <img src> into <picture> (probes image widths)
//! # "srcset-augment" - add a <picture> next to <img srcset="a.jpg 800w">
//! # "lqip"           - wrap images in a blurred placeholder container
//! pipeline = ["srcset", "lqip"]
//!
//! [srcset]
//! width = [1, 720, 360]     # 1 = the original width
//! format = ["webp", "jpg"]
//! prefix = "@"              # photo@720w.webp
//! postfix = "w"
//! root = "public"           # where /site-root URLs live (optional)
//!
//! [lqip]
//! base = "public"           # required when "lqip" is in the pipeline
//! query = "img[src]"
//! add_styles = false        # also accepted as addStyles
//! preview_width = 10
//! quality = 60
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Quality;
use crate::transform::{LqipOptions, SrcsetOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "picture-pipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// One pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    Srcset,
    SrcsetAugment,
    Lqip,
}

impl TransformKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformKind::Srcset => "srcset",
            TransformKind::SrcsetAugment => "srcset-augment",
            TransformKind::Lqip => "lqip",
        }
    }
}

/// Pipeline configuration loaded from `picture-pipe.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Transformers to run, in order.
    pub pipeline: Vec<TransformKind>,
    /// Responsive-image settings, shared by `srcset` and `srcset-augment`.
    pub srcset: SrcsetConfig,
    /// Placeholder settings.
    pub lqip: LqipConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values against the steps that will use them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uses_srcset = self
            .pipeline
            .iter()
            .any(|k| matches!(k, TransformKind::Srcset | TransformKind::SrcsetAugment));
        if uses_srcset {
            if self.srcset.width.is_empty() {
                return Err(ConfigError::Validation(
                    "srcset.width must not be empty".into(),
                ));
            }
            if self.srcset.format.is_empty() {
                return Err(ConfigError::Validation(
                    "srcset.format must not be empty".into(),
                ));
            }
        }
        if self.srcset.width.contains(&0) {
            return Err(ConfigError::Validation(
                "srcset.width values must be non-zero".into(),
            ));
        }
        if self.srcset.format.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "srcset.format values must not be empty strings".into(),
            ));
        }

        if self.pipeline.contains(&TransformKind::Lqip) {
            let has_base = self
                .lqip
                .base
                .as_ref()
                .is_some_and(|b| !b.as_os_str().is_empty());
            if !has_base {
                return Err(ConfigError::Validation(
                    "lqip.base is required when lqip is in the pipeline".into(),
                ));
            }
        }
        if self.lqip.quality > 100 {
            return Err(ConfigError::Validation("lqip.quality must be 0-100".into()));
        }
        if self.lqip.preview_width == 0 {
            return Err(ConfigError::Validation(
                "lqip.preview_width must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Responsive-image settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SrcsetConfig {
    /// Target widths; `1` stands for the original width.
    pub width: Vec<u32>,
    /// Target formats, one `<source>` per entry.
    pub format: Vec<String>,
    /// Inserted between the filename and the width.
    pub prefix: String,
    /// Inserted between the width and the extension.
    pub postfix: String,
    /// Directory that site-root URLs (`/img/a.png`) resolve against.
    pub root: Option<PathBuf>,
}

impl Default for SrcsetConfig {
    fn default() -> Self {
        Self {
            width: vec![1],
            format: vec!["webp".to_string()],
            prefix: "@".to_string(),
            postfix: "w".to_string(),
            root: None,
        }
    }
}

impl SrcsetConfig {
    pub fn to_options(&self) -> SrcsetOptions {
        SrcsetOptions {
            width: self.width.clone(),
            format: self.format.clone(),
            prefix: self.prefix.clone(),
            postfix: self.postfix.clone(),
            root: self.root.clone(),
        }
    }
}

/// Placeholder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LqipConfig {
    /// Directory image URLs resolve against.
    pub base: Option<PathBuf>,
    /// Selector for the elements to wrap.
    pub query: String,
    /// Append the placeholder stylesheet to `<head>`.
    #[serde(alias = "addStyles")]
    pub add_styles: bool,
    /// Long edge of the inline preview, in pixels.
    pub preview_width: u32,
    /// JPEG quality of the inline preview (0-100).
    pub quality: u32,
}

impl Default for LqipConfig {
    fn default() -> Self {
        Self {
            base: None,
            query: "img[src]".to_string(),
            add_styles: false,
            preview_width: 10,
            quality: 60,
        }
    }
}

impl LqipConfig {
    pub fn to_options(&self) -> LqipOptions {
        LqipOptions {
            base: self.base.clone(),
            query: self.query.clone(),
            add_styles: self.add_styles,
            preview_width: self.preview_width,
            quality: Quality::new(self.quality),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or stock defaults when there is none.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. An explicit path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picture-pipe Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Transformers to run on every document, in order:
#   "srcset"         - rewrite <img src="..."> into <picture> with one <source>
#                      per format; image widths are probed from the files
#   "srcset-augment" - for <img srcset="photo.jpg 800w">, add a <picture>
#                      right after the image, keeping the original in place
#   "lqip"           - wrap images in a container showing a tiny blurred
#                      preview until the real image has loaded
# Example: pipeline = ["srcset", "lqip"]
pipeline = []

# ---------------------------------------------------------------------------
# Responsive images (srcset, srcset-augment)
# ---------------------------------------------------------------------------
[srcset]
# Widths to reference. 1 means "the original width". Widths not smaller
# than the original image are left out.
width = [1]

# One <source> per format. No type attribute is written for the format
# matching the original file's extension.
format = ["webp"]

# Variant names are {filename}{prefix}{width}{postfix}.{format},
# e.g. photo@720w.webp. The original width uses {filename}.{format}.
prefix = "@"
postfix = "w"

# Directory that site-root URLs (/img/photo.jpg) resolve against.
# Relative URLs resolve against the directory of the HTML file.
# root = "public"

# ---------------------------------------------------------------------------
# Placeholders (lqip)
# ---------------------------------------------------------------------------
[lqip]
# Directory image URLs resolve against. Required when lqip is used.
# base = "public"

# CSS selector for the elements to wrap.
query = "img[src]"

# Append the placeholder stylesheet to the document's <head>.
add_styles = false

# Long edge of the inline preview, in pixels.
preview_width = 10

# JPEG quality of the inline preview (0 = worst, 100 = best).
quality = 60

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert!(config.pipeline.is_empty());
        assert_eq!(config.srcset.width, vec![1]);
        assert_eq!(config.srcset.format, vec!["webp"]);
        assert_eq!(config.srcset.prefix, "@");
        assert_eq!(config.srcset.postfix, "w");
        assert_eq!(config.lqip.query, "img[src]");
        assert!(!config.lqip.add_styles);
        assert_eq!(config.lqip.preview_width, 10);
        assert_eq!(config.lqip.quality, 60);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn parse_pipeline_order() {
        let config: PipelineConfig =
            toml::from_str(r#"pipeline = ["srcset-augment", "lqip", "srcset", "lqip"]"#).unwrap();
        assert_eq!(
            config.pipeline,
            vec![
                TransformKind::SrcsetAugment,
                TransformKind::Lqip,
                TransformKind::Srcset,
                TransformKind::Lqip,
            ]
        );
    }

    #[test]
    fn unknown_step_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str(r#"pipeline = ["resize"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str(
            r#"
[srcset]
widths = [400]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn add_styles_camel_case_alias() {
        let config: PipelineConfig = toml::from_str(
            r#"
[lqip]
addStyles = true
"#,
        )
        .unwrap();
        assert!(config.lqip.add_styles);
    }

    #[test]
    fn validate_srcset_needs_widths_and_formats() {
        let mut config = PipelineConfig {
            pipeline: vec![TransformKind::Srcset],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());

        config.srcset.width.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.srcset.width = vec![400];
        config.srcset.format.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_lists_fine_when_unused() {
        let mut config = PipelineConfig::default();
        config.srcset.width.clear();
        config.srcset.format.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_width() {
        let mut config = PipelineConfig::default();
        config.srcset.width = vec![400, 0];
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_lqip_needs_base() {
        let mut config = PipelineConfig {
            pipeline: vec![TransformKind::Lqip],
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.lqip.base = Some(PathBuf::from("public"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_quality_range() {
        let mut config = PipelineConfig::default();
        config.lqip.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.lqip.quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge / load
    // =========================================================================

    #[test]
    fn merge_overrides_scalars_and_replaces_arrays() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[srcset]
width = [720, 360]
prefix = "-"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let config: PipelineConfig = merged.try_into().unwrap();
        assert_eq!(config.srcset.width, vec![720, 360]);
        assert_eq!(config.srcset.prefix, "-");
        // Untouched siblings keep their defaults.
        assert_eq!(config.srcset.postfix, "w");
        assert_eq!(config.srcset.format, vec!["webp"]);
    }

    #[test]
    fn merge_adds_new_keys() {
        let base: toml::Value = toml::from_str("a = 1").unwrap();
        let overlay: toml::Value = toml::from_str("b = 2").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").and_then(|v| v.as_integer()), Some(1));
        assert_eq!(merged.get("b").and_then(|v| v.as_integer()), Some(2));
    }

    #[test]
    fn load_config_without_file_is_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let (_tmp, path) = write_config(
            r#"
pipeline = ["srcset", "lqip"]

[srcset]
width = [1, 720, 360]
format = ["webp", "jpg"]
root = "public"

[lqip]
base = "public"
addStyles = true
"#,
        );
        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(
            config.pipeline,
            vec![TransformKind::Srcset, TransformKind::Lqip]
        );
        assert_eq!(config.srcset.width, vec![1, 720, 360]);
        assert_eq!(config.srcset.root, Some(PathBuf::from("public")));
        assert_eq!(config.lqip.base, Some(PathBuf::from("public")));
        assert!(config.lqip.add_styles);
        assert_eq!(config.lqip.quality, 60);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(tmp.path().join("nope.toml").as_path()));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml() {
        let (_tmp, path) = write_config("pipeline = [");
        assert!(matches!(
            load_config(Some(path.as_path())),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_config_validates_after_merge() {
        let (_tmp, path) = write_config(r#"pipeline = ["lqip"]"#);
        assert!(matches!(
            load_config(Some(path.as_path())),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn options_conversion() {
        let config = PipelineConfig::default();
        let srcset = config.srcset.to_options();
        assert_eq!(srcset.prefix, "@");
        assert_eq!(srcset.width, vec![1]);
        let lqip = config.lqip.to_options();
        assert_eq!(lqip.query, "img[src]");
        assert_eq!(lqip.quality.value(), 60);
    }
}
