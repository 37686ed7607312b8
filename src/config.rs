use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::ColorSpace;
use crate::error::{ChunkyError, Result};

/// Side length of a Full-resolution chunk in the reference configuration.
pub const DEFAULT_CHUNK_SIZE: u32 = 256;

/// Free-list soft cap per (resolution, color space).
pub const DEFAULT_POOL_CAPACITY: usize = 200;

/// Commits between sweeps that drop fully transparent committed chunks.
pub const DEFAULT_CLEANUP_INTERVAL: u32 = 30;

/// Engine-wide settings shared by a pool and the stores that borrow from it.
///
/// ```toml
/// chunk_size = 256
/// pool_capacity = 200
/// cleanup_interval = 30
/// color_space = "Srgb"
/// log_file = "/tmp/chunky.log"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunk_size: u32,
    pub pool_capacity: usize,
    pub cleanup_interval: u32,
    pub color_space: ColorSpace,
    pub log_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            color_space: ColorSpace::default(),
            log_file: None,
        }
    }
}

impl EngineConfig {
    /// Default settings with a different chunk size.
    pub fn with_chunk_size(chunk_size: u32) -> Self {
        Self { chunk_size, ..Self::default() }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || !self.chunk_size.is_power_of_two() {
            return Err(ChunkyError::InvalidConfig(format!(
                "chunk_size must be a power of two, got {}",
                self.chunk_size
            )));
        }
        if self.chunk_size > 4096 {
            return Err(ChunkyError::InvalidConfig(format!(
                "chunk_size {} exceeds 4096",
                self.chunk_size
            )));
        }
        if self.cleanup_interval == 0 {
            return Err(ChunkyError::InvalidConfig("cleanup_interval must be at least 1".into()));
        }
        Ok(())
    }

    /// Open the session log if `log_file` is set.  Returns whether a log file
    /// is active afterwards.
    pub fn init_logging(&self) -> bool {
        if let Some(path) = &self.log_file {
            crate::logger::init(path);
        }
        crate::logger::is_enabled()
    }
}
