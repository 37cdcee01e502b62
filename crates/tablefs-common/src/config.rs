//! Configuration types for TableFS
//!
//! This module defines the TOML configuration shared by the library and the
//! CLI. Every section has defaults so an absent file is a valid setup.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default chunk size: 256 KB
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default number of chunks committed per insert batch
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 1000;

/// Default number of chunks fetched per read task
pub const DEFAULT_READ_BATCH_SIZE: usize = 10;

/// Upper bound for the worker pool
pub const MAX_WORKERS_CAP: usize = 32;

/// Worker pool size used when none is configured: `min(32, cpus + 4)`
#[must_use]
pub fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    MAX_WORKERS_CAP.min(cpus + 4)
}

/// Root configuration for TableFS
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Row store location
    pub storage: StorageConfig,
    /// Chunking and batching
    pub chunking: ChunkConfig,
    /// Worker pool sizing
    pub workers: WorkerConfig,
}

impl Config {
    /// Parse a TOML document, filling missing keys with defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path)?;
        Self::from_toml_str(&config_str)
    }

    /// Reject settings the chunk engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Configuration("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.write_batch_size == 0 {
            return Err(Error::Configuration(
                "chunking.write_batch_size must be positive".into(),
            ));
        }
        if self.chunking.read_batch_size == 0 {
            return Err(Error::Configuration(
                "chunking.read_batch_size must be positive".into(),
            ));
        }
        if self.workers.max_workers == Some(0) {
            return Err(Error::Configuration("workers.max_workers must be positive".into()));
        }
        Ok(())
    }
}

/// Row store configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the redb database file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./tablefs.redb"),
        }
    }
}

/// Chunking configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum payload bytes per chunk row
    pub chunk_size: usize,
    /// Chunks per insert batch on write
    pub write_batch_size: usize,
    /// Chunks per fetch task on read
    pub read_batch_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
        }
    }
}

/// Worker pool configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Concurrent batch tasks; `None` uses [`default_max_workers`]
    pub max_workers: Option<usize>,
}

impl WorkerConfig {
    /// Effective pool size
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.max_workers.unwrap_or_else(default_max_workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size, 262_144);
        assert_eq!(config.chunking.write_batch_size, 1000);
        assert_eq!(config.chunking.read_batch_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_max_workers_bounds() {
        let workers = WorkerConfig::default().resolved();
        assert!(workers >= 5);
        assert!(workers <= MAX_WORKERS_CAP);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [chunking]
            chunk_size = 4096

            [workers]
            max_workers = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 4096);
        assert_eq!(config.chunking.write_batch_size, DEFAULT_WRITE_BATCH_SIZE);
        assert_eq!(config.workers.resolved(), 4);
        assert_eq!(config.storage.path, PathBuf::from("./tablefs.redb"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[chunking]\nchunk_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = Config::from_toml_str("chunking = 3").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablefs.toml");
        std::fs::write(&path, "[storage]\npath = \"/tmp/x.redb\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/tmp/x.redb"));
    }
}
