//! Tool configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a user file in the config directory (`--config`, default
//! the current directory).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [dictionaries]
//! artists = "assets/artist.txt"       # relative to the config directory
//! characters = "assets/character.txt"
//! enabled = true                      # false: skip loading, no matches
//!
//! [output]
//! format = "text"                     # "text" or "json"
//! show_raw_tags = false               # list every raw tag in text output
//! max_prompt_chars = 400              # prompt truncation in text output
//!
//! [processing]
//! max_processes = 4                   # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [output]
//! format = "json"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::matcher::{DictionarySource, MatcherRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Artist and character dictionary files.
    pub dictionaries: DictionaryConfig,
    /// How reports are printed.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.max_prompt_chars == 0 {
            return Err(ConfigError::Validation(
                "output.max_prompt_chars must be greater than 0".into(),
            ));
        }
        if self.dictionaries.enabled
            && (self.dictionaries.artists.trim().is_empty()
                || self.dictionaries.characters.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "dictionaries.artists and dictionaries.characters must be set when enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Dictionary file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DictionaryConfig {
    pub artists: String,
    pub characters: String,
    pub enabled: bool,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            artists: "assets/artist.txt".to_string(),
            characters: "assets/character.txt".to_string(),
            enabled: true,
        }
    }
}

impl DictionaryConfig {
    /// `(artists, characters)` sources, paths resolved against `base`.
    pub fn sources(&self, base: &Path) -> (DictionarySource, DictionarySource) {
        if !self.enabled {
            return (DictionarySource::Empty, DictionarySource::Empty);
        }
        (
            DictionarySource::File(base.join(&self.artists)),
            DictionarySource::File(base.join(&self.characters)),
        )
    }

    /// A registry over these dictionaries. Not initialized.
    pub fn registry(&self, base: &Path) -> MatcherRegistry {
        let (artists, characters) = self.sources(base);
        MatcherRegistry::new(artists, characters)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Report printing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub show_raw_tags: bool,
    /// Prompts longer than this are cut in text output.
    pub max_prompt_chars: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            show_raw_tags: false,
            max_prompt_chars: 400,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel inspection workers.
    /// When absent or null, defaults to the number of CPU cores.
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
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
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

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# promptlens Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the directory passed with --config
# (default: the current directory). Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Name dictionaries
# ---------------------------------------------------------------------------
[dictionaries]
# One or more comma-separated names per line. Paths are relative to the
# config directory. Each name also matches with backslash escapes removed
# and with spaces written as underscores.
artists = "assets/artist.txt"
characters = "assets/character.txt"

# Set to false to skip loading; prompts are then not annotated.
enabled = true

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# "text" for a readable summary, "json" for one JSON document per run.
format = "text"

# List every raw tag under each report (text output only).
show_raw_tags = false

# Prompts longer than this many characters are cut in text output.
max_prompt_chars = 400

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers when inspecting many files.
# Omit to use all CPU cores. Larger values are clamped to the core count.
# max_processes = 4
"##
}
