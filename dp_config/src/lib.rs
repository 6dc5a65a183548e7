//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles all application settings from environment variables and files

use config::{Config as ConfigBuilder, Environment, File};
use dp_core::{Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub seed: SeedConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub path: String,
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "depot.db".to_string(),
            pool_size: 5,
            sqlite_wal: true,
        }
    }
}

/// Sample-data seeding configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SeedConfig {
    /// Whether to insert sample data on first run
    pub sample_data: bool,
    /// Path of the key-value file that persists the first-run flag
    #[validate(length(min = 1))]
    pub flags_path: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            sample_data: true,
            flags_path: "depot.flags.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and optional .env file
    pub fn load() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // Set defaults first
        builder = builder
            .set_default("database.path", "depot.db")?
            .set_default("database.pool_size", 5)?
            .set_default("database.sqlite_wal", true)?
            .set_default("seed.sample_data", true)?
            .set_default("seed.flags_path", "depot.flags.json")?;

        // Handle nested environment variables that don't work with the standard separator
        if let Ok(pool_size) = std::env::var("DEPOT_DATABASE_POOL_SIZE") {
            builder = builder.set_override("database.pool_size", pool_size)?;
        }
        if let Ok(sqlite_wal) = std::env::var("DEPOT_DATABASE_SQLITE_WAL") {
            builder = builder.set_override("database.sqlite_wal", sqlite_wal)?;
        }
        if let Ok(sample_data) = std::env::var("DEPOT_SEED_SAMPLE_DATA") {
            builder = builder.set_override("seed.sample_data", sample_data)?;
        }
        if let Ok(flags_path) = std::env::var("DEPOT_SEED_FLAGS_PATH") {
            builder = builder.set_override("seed.flags_path", flags_path)?;
        }

        // Try to load from .env file if it exists (optional)
        if std::path::Path::new(".env").exists() {
            builder = builder.add_source(File::with_name(".env").required(false));
        }

        // Load from environment variables with DEPOT_ prefix (highest priority)
        builder = builder.add_source(
            Environment::with_prefix("DEPOT")
                .try_parsing(true)
                .separator("_"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        // Validate the configuration
        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }
}
