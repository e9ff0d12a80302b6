//! Reader configuration
//!
//! Tuning for the disc reader backends, loadable from JSON. There is no global
//! instance; callers hand a [`ReaderConfig`] to
//! [`DiscReader::open_with_config`](crate::disc::DiscReader::open_with_config).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::disc::DiscError;

/// Which DiscReader backend services reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Dedicated reader thread with read-ahead into a sector cache
    #[default]
    Threaded,
    /// Synchronous reads on the caller's thread
    Direct,
}

impl BackendKind {
    /// Get the display name for this backend
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Threaded => "threaded",
            Self::Direct => "direct",
        }
    }
}

/// Disc reader configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// The image is already memory-resident; forces the direct backend
    #[serde(default)]
    pub image_memcache: bool,
    /// Number of raw sectors kept by the threaded backend
    #[serde(default = "default_cache_slots")]
    pub cache_slots: usize,
    /// Maximum sectors prefetched past the latest request
    #[serde(default = "default_max_read_ahead")]
    pub max_read_ahead: u32,
    /// Sectors queued after a seek
    #[serde(default = "default_initial_read_ahead")]
    pub initial_read_ahead: u32,
    /// Sectors queued per sequential request while under the limit
    #[serde(default = "default_read_ahead_step")]
    pub read_ahead_step: u32,
}

fn default_cache_slots() -> usize {
    256
}

fn default_max_read_ahead() -> u32 {
    16
}

fn default_initial_read_ahead() -> u32 {
    1
}

fn default_read_ahead_step() -> u32 {
    2
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            image_memcache: false,
            cache_slots: default_cache_slots(),
            max_read_ahead: default_max_read_ahead(),
            initial_read_ahead: default_initial_read_ahead(),
            read_ahead_step: default_read_ahead_step(),
        }
    }
}

impl ReaderConfig {
    /// The backend that will actually be used
    pub fn effective_backend(&self) -> BackendKind {
        if self.image_memcache {
            BackendKind::Direct
        } else {
            self.backend
        }
    }

    /// Check the read-ahead window fits the cache
    ///
    /// The window must stay well inside the ring so a sector a consumer is
    /// waiting for is never evicted by prefetch before it is copied out.
    pub fn validate(&self) -> Result<(), DiscError> {
        if self.cache_slots == 0 {
            return Err(DiscError::InvalidConfig("cache_slots must be at least 1".to_string()));
        }
        if self.initial_read_ahead == 0 || self.read_ahead_step == 0 {
            return Err(DiscError::InvalidConfig(
                "initial_read_ahead and read_ahead_step must be at least 1".to_string(),
            ));
        }
        if self.max_read_ahead as usize >= self.cache_slots / 4 {
            return Err(DiscError::InvalidConfig(format!(
                "max_read_ahead {} must be below a quarter of cache_slots {}",
                self.max_read_ahead, self.cache_slots
            )));
        }
        let ceiling = self.max_read_ahead.saturating_add(1);
        if self.initial_read_ahead > ceiling || self.read_ahead_step > ceiling {
            return Err(DiscError::InvalidConfig(format!(
                "initial_read_ahead and read_ahead_step may not exceed {}",
                ceiling
            )));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self, DiscError> {
        let config: ReaderConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, DiscError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        log::info!("Loaded reader config from {}", path.display());
        Ok(config)
    }
}
