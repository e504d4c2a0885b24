//! Configuration for tenantkv
//!
//! Centralized configuration with sensible defaults. Read once by
//! `KvdbManager::initialize`.

use std::path::PathBuf;

/// Main configuration for a manager instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the engine files. Created on initialize.
    /// Internal structure:
    ///   {storage_path}/
    ///     └── {db_name}/      (engine files, one namespace per logical DB)
    pub storage_path: PathBuf,

    /// Name of the main database inside `storage_path`
    pub db_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./tenantkv_data"),
            db_name: "kvdb".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full path handed to the engine
    pub fn db_path(&self) -> PathBuf {
        self.storage_path.join(&self.db_name)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage directory
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = path.into();
        self
    }

    /// Set the main database name
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.config.db_name = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
