//! Dispatch configuration.
//!
//! Loaded from TOML; every field has a default so partial files are fine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on nested promoter / legacy re-resolution.
pub const DEFAULT_MAX_PROMOTION_DEPTH: usize = 32;

/// Configuration for one operation's dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum depth of promoter and legacy re-resolution before the call
    /// fails with `RecursionLimitExceeded`.
    pub max_promotion_depth: usize,

    /// Emit per-slot matching and specificity decisions at `debug` level
    /// instead of `trace`.
    pub trace_promotion: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_promotion_depth: DEFAULT_MAX_PROMOTION_DEPTH,
            trace_promotion: false,
        }
    }
}

/// Errors raised while loading a [`DispatchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("max_promotion_depth must be at least 1")]
    ZeroDepth,
}

impl DispatchConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DispatchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_promotion_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_for_empty_document() {
        let config = DispatchConfig::from_toml_str("").unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.max_promotion_depth, DEFAULT_MAX_PROMOTION_DEPTH);
    }

    #[test]
    fn test_partial_document() {
        let config = DispatchConfig::from_toml_str("max_promotion_depth = 4").unwrap();
        assert_eq!(config.max_promotion_depth, 4);
        assert!(!config.trace_promotion);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = DispatchConfig::from_toml_str("max_promotion_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDepth));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trace_promotion = true").unwrap();
        let config = DispatchConfig::load(file.path()).unwrap();
        assert!(config.trace_promotion);
    }

    #[test]
    fn test_invalid_type_reported() {
        let err = DispatchConfig::from_toml_str("max_promotion_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
