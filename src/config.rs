//! Configuration management module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable consulted when the SMTP username is not configured.
pub const MAIL_USERNAME_ENV: &str = "MAIL_USERNAME";
/// Environment variable consulted when the SMTP password is not configured.
pub const MAIL_PASSWORD_ENV: &str = "MAIL_PASSWORD";

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file.
    pub path: String,
}

/// Outgoing mail server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Login; empty means `MAIL_USERNAME`.
    #[serde(default)]
    pub username: String,
    /// Password; empty means `MAIL_PASSWORD`.
    #[serde(default)]
    pub password: String,
    /// Display name on outgoing mail.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

fn default_sender_name() -> String {
    "Medical Center".to_string()
}

/// Report and document output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for reports saved without a dialog.
    pub output_dir: String,
}

/// Account protection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Username of the administrator that cannot be demoted or deleted.
    pub primary_admin: String,
}

impl AppConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Validation("Database path cannot be empty".to_string()));
        }
        if self.smtp.host.trim().is_empty() {
            return Err(ConfigError::Validation("SMTP host cannot be empty".to_string()));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Validation("SMTP port must be greater than 0".to_string()));
        }
        if self.security.primary_admin.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Primary admin username cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl DatabaseConfig {
    /// Build connection string for SeaORM, creating the file if needed.
    pub fn connection_string(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path)
    }
}

impl SmtpConfig {
    /// Username with environment fallback.
    pub fn resolved_username(&self) -> String {
        resolve_with_env(&self.username, MAIL_USERNAME_ENV)
    }

    /// Password with environment fallback.
    pub fn resolved_password(&self) -> String {
        resolve_with_env(&self.password, MAIL_PASSWORD_ENV)
    }
}

fn resolve_with_env(value: &str, var: &str) -> String {
    if value.is_empty() {
        std::env::var(var).unwrap_or_default()
    } else {
        value.to_string()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "med_center.db".to_string(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.mail.ru".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            sender_name: default_sender_name(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            primary_admin: "admin".to_string(),
        }
    }
}
