//! ABOUTME: File-backed key-value store for process-wide flags
//! ABOUTME: Persists the first-run seeding flag separately from the database

use dp_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const DB_INITIALIZED: &str = "DB_INITIALIZED";

/// Small persistent key-value store, one JSON object per file
///
/// Lives outside the SQLite database so the first-run flag survives a
/// deleted or recreated database file, mirroring a device-local preference
/// store.
#[derive(Debug, Clone)]
pub struct FlagStore {
    path: PathBuf,
}

impl FlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        if !Path::new(&self.path).exists() {
            return Ok(HashMap::new());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Decode(format!("Corrupt flag store {}: {}", self.path.display(), e)))
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| Error::Database(format!("Failed to serialize flag store: {}", e)))?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }

    /// Get a flag value by key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.read_map().await?;
        Ok(map.get(key).cloned())
    }

    /// Set a flag value
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await?;

        debug!(key = %key, "Flag written");
        Ok(())
    }

    /// Check whether sample data has been seeded
    pub async fn is_data_seeded(&self) -> Result<bool> {
        Ok(self.get(DB_INITIALIZED).await?.as_deref() == Some("true"))
    }

    /// Mark sample data as seeded
    pub async fn mark_data_seeded(&self) -> Result<()> {
        self.set(DB_INITIALIZED, "true").await
    }
}
