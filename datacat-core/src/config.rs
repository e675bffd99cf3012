//! 配置管理
//!
//! Catalog configuration with TOML persistence and validation.

use crate::{CatalogError, CatalogResult, ErrorContext, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Session handling
    pub session: SessionSettings,
    /// Logging bootstrap
    pub logging: LoggingConfig,
}

/// Session handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Idle minutes before a session expires; zero or less disables expiry
    pub ttl_minutes: i64,
    /// Whether anonymous sessions may be created
    pub allow_anonymous: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: 480,
            allow_anonymous: true,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Conventional location of the config file, when the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("datacat").join("config.toml"))
    }

    /// Load and validate a configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| CatalogError::Config {
            message: format!("Failed to read config file: {}", path.as_ref().display()),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("from_file")
                .with_suggestion("Check that the config file exists and is readable"),
        })?;

        let config: CatalogConfig = toml::from_str(&content).map_err(|e| CatalogError::Config {
            message: format!("Failed to parse config file: {}", path.as_ref().display()),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("from_file")
                .with_suggestion("Check the TOML syntax of the config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CatalogResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| CatalogError::Config {
            message: "Failed to serialize configuration".to_string(),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("save_to_file"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> CatalogResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(CatalogError::Config {
                message: format!("Unknown log level: {}", self.logging.level),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use one of: trace, debug, info, warn, error"),
            });
        }

        if self.logging.log_to_file && self.logging.log_file_path.is_none() {
            return Err(CatalogError::Config {
                message: "log_to_file is set but log_file_path is empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set logging.log_file_path or disable logging.log_to_file"),
            });
        }

        Ok(())
    }
}
