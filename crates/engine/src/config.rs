//! Index configuration
//!
//! Parameters are supplied once at construction; there is no runtime
//! reconfiguration. They can be built in code or read from a TOML file.

use crate::clock::{Clock, LocalClock, UtcClock};
use dayvec_core::{IndexError, IndexResult, DEFAULT_DIMENSION, DEFAULT_MAX_DAYS, MAX_DIMENSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "dayvec.toml";

const WRITE_PROBE_NAME: &str = ".dayvec-write-probe";

/// Which calendar decides where one day ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    /// Process-local date
    #[default]
    Local,
    /// UTC date
    Utc,
}

impl Timezone {
    /// Clock reading dates in this timezone
    pub fn clock(self) -> Arc<dyn Clock> {
        match self {
            Timezone::Local => Arc::new(LocalClock),
            Timezone::Utc => Arc::new(UtcClock),
        }
    }
}

/// Index configuration
///
/// # Example
///
/// ```toml
/// storage_dir = "/var/lib/crm-index"
/// dimension = 384
/// max_days = 7
/// delete_expired = true
/// timezone = "local"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the partition files; must be writable
    pub storage_dir: PathBuf,
    /// Length of every vector
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Retention window length in days, today included
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    /// Delete files of partitions that fall out of the window
    #[serde(default = "default_delete_expired")]
    pub delete_expired: bool,
    /// Day boundary
    #[serde(default)]
    pub timezone: Timezone,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_max_days() -> u32 {
    DEFAULT_MAX_DAYS
}

fn default_delete_expired() -> bool {
    true
}

impl IndexConfig {
    /// Defaults rooted at `storage_dir`
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        IndexConfig {
            storage_dir: storage_dir.into(),
            dimension: DEFAULT_DIMENSION,
            max_days: DEFAULT_MAX_DAYS,
            delete_expired: true,
            timezone: Timezone::Local,
        }
    }

    /// Set the vector dimension
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the retention window
    pub fn with_max_days(mut self, max_days: u32) -> Self {
        self.max_days = max_days;
        self
    }

    /// Keep expired files on disk instead of deleting them
    pub fn with_delete_expired(mut self, delete_expired: bool) -> Self {
        self.delete_expired = delete_expired;
        self
    }

    /// Set the day boundary
    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero or oversized dimension, a zero
    /// retention window, or an empty storage path.
    pub fn validate(&self) -> IndexResult<()> {
        if self.dimension == 0 || self.dimension > MAX_DIMENSION {
            return Err(IndexError::Config(format!(
                "dimension must be between 1 and {}, got {}",
                MAX_DIMENSION, self.dimension
            )));
        }
        if self.max_days == 0 {
            return Err(IndexError::Config(
                "max_days must be at least 1".to_string(),
            ));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(IndexError::Config(
                "storage_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the storage directory if needed and check it is writable
    pub fn prepare_storage(&self) -> IndexResult<()> {
        let dir = &self.storage_dir;
        fs::create_dir_all(dir).map_err(|e| {
            IndexError::Config(format!(
                "cannot create storage_dir '{}': {}",
                dir.display(),
                e
            ))
        })?;
        if !dir.is_dir() {
            return Err(IndexError::Config(format!(
                "storage_dir '{}' is not a directory",
                dir.display()
            )));
        }

        let probe = dir.join(WRITE_PROBE_NAME);
        fs::write(&probe, b"").map_err(|e| {
            IndexError::Config(format!(
                "storage_dir '{}' is not writable: {}",
                dir.display(),
                e
            ))
        })?;
        let _ = fs::remove_file(&probe);
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# dayvec index configuration
#
# Directory holding index_<date>.vec / metadata_<date>.meta pairs
storage_dir = "./index"

# Embedding length; every inserted vector must match (default: 384)
dimension = 384

# Days kept resident and on disk, today included (default: 7)
max_days = 7

# Delete partition files once they fall out of the window (default: true)
delete_expired = true

# Day boundary: "local" (process-local date, default) or "utc"
timezone = "local"
"#
    }

    /// Read, parse and validate config from a file path.
    pub fn from_file(path: &Path) -> IndexResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IndexError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: IndexConfig = toml::from_str(&content).map_err(|e| {
            IndexError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> IndexResult<()> {
        if !path.exists() {
            fs::write(path, Self::default_toml()).map_err(|e| {
                IndexError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
