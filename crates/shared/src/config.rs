//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::AppError;
use crate::types::Product;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Billing configuration.
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the database file (`DBPATH`).
    #[serde(default)]
    pub dir: String,
    /// Database file name inside `dir`.
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Open the store in (soft) read-only mode.
    #[serde(default)]
    pub read_only: bool,
}

fn default_file_name() -> String {
    "tollgate.sqlite".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            file_name: default_file_name(),
            read_only: false,
        }
    }
}

impl DatabaseConfig {
    /// Resolves the full path of the database file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] if no database directory is set.
    pub fn path(&self) -> Result<PathBuf, AppError> {
        if self.dir.trim().is_empty() {
            return Err(AppError::Configuration(
                "database directory (DBPATH) is not set".to_string(),
            ));
        }
        if self.file_name.trim().is_empty() {
            return Err(AppError::Configuration(
                "database file name is empty".to_string(),
            ));
        }
        Ok(PathBuf::from(&self.dir).join(&self.file_name))
    }
}

/// Billing configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingConfig {
    /// Product label written into session records.
    #[serde(default)]
    pub product: Product,
    /// Start with the free period switched on.
    #[serde(default)]
    pub free_period: bool,
}

impl AppConfig {
    /// Loads configuration from config files and the environment.
    ///
    /// `DBPATH`, when set, overrides `database.dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TOLLGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.dir", std::env::var("DBPATH").ok())?
            .build()?;

        config.try_deserialize()
    }
}
