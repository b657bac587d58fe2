//! Configuration management

use crate::error::{ErrorContext, ResaclError, ResaclResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, stored as TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResaclConfig {
    pub database: DatabaseConfig,
    pub acl: AclConfig,
    pub directory: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = ResaclConfig::data_dir().join("resacl.db");
        Self {
            url: format!("sqlite://{}", path.display()),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Upper bound on a single `list` page; unbounded when unset
    pub max_page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// TOML fixture describing users, organizations, packages and resources
    pub path: Option<PathBuf>,
}

impl ResaclConfig {
    /// Base directory for local state
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".resacl")
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ResaclResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ResaclError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: ResaclConfig = toml::from_str(&content).map_err(|e| ResaclError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ResaclResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ResaclError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| ResaclError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ResaclResult<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(ResaclError::Config {
                message: format!("Unsupported database url: {}", self.database.url),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use a sqlite: URL for database.url"),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ResaclError::Config {
                message: "database.max_connections must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set database.max_connections to a positive value"),
            });
        }

        if self.acl.max_page_size == Some(0) {
            return Err(ResaclError::Config {
                message: "acl.max_page_size must be greater than 0 when set".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Remove acl.max_page_size to allow unbounded listing"),
            });
        }

        Ok(())
    }
}
