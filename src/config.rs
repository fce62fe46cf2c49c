//! User configuration
//!
//! Read from `<config dir>/linetint/config.json`. Every field has a default,
//! so an empty object (or no file at all) is a valid configuration.

use crate::primitives::parser::{ParserOptions, DEFAULT_MAX_LINE_LENGTH};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Handling of includes that name a missing repository entry or grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissingPatternPolicy {
    /// Log a warning and treat the include as matching nothing
    #[default]
    Warn,
    /// Fail rule resolution
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ThemingConfig {
    /// Theme name (looked up in `theme_dirs`, then built-ins) or a theme file path
    pub theme: String,
    /// Directories searched for `.json` and `.tmTheme` themes
    pub theme_dirs: Vec<PathBuf>,
    /// Directories searched for grammar files
    pub grammar_dirs: Vec<PathBuf>,
    pub missing_pattern: MissingPatternPolicy,
    /// Lines longer than this many bytes are not tokenized
    pub max_line_length: usize,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ThemingConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            theme_dirs: Vec::new(),
            grammar_dirs: Vec::new(),
            missing_pattern: MissingPatternPolicy::Warn,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            log_filter: "warn".to_string(),
        }
    }
}

impl ThemingConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<config dir>/linetint/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("linetint").join("config.json"))
    }

    /// Load from the default path, falling back to defaults when it is missing
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            missing_pattern: self.missing_pattern,
            max_line_length: self.max_line_length,
        }
    }
}
