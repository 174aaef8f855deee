//! Configuration for portfolio-core
//!
//! Loaded from a TOML file; every key is optional:
//!
//! ```toml
//! default_category = "other"
//! manual_order_path = "/var/lib/portfolio/manual-order.json"
//! realtime_buffer = 64
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Category given to projects whose tags and category are all empty
    pub default_category: String,
    /// Where the manual order overlay is kept between runs (in memory only when unset)
    pub manual_order_path: Option<PathBuf>,
    /// Capacity of the channel created by [`crate::realtime_channel`]
    pub realtime_buffer: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_category: "other".to_string(),
            manual_order_path: None,
            realtime_buffer: 64,
        }
    }
}

impl CatalogConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded catalog config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn with_manual_order_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manual_order_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = CatalogConfig::from_toml_str("").unwrap();
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = CatalogConfig::from_toml_str(
            r#"
            default_category = "misc"
            realtime_buffer = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.default_category, "misc");
        assert_eq!(config.realtime_buffer, 8);
        assert!(config.manual_order_path.is_none());
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = CatalogConfig::from_toml_str("realtime_buffer = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CatalogConfig::load("/nonexistent/portfolio.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
