//! Session configuration
//!
//! All fields have defaults, so an empty JSON object is a valid
//! configuration:
//!
//! ```rust
//! use cotext_core::SessionConfig;
//!
//! let config = SessionConfig::from_json("{}").unwrap();
//! assert_eq!(config.allocator.base, 32);
//! assert_eq!(config.flush_interval_ms, 200);
//! ```

use crate::crdt::text::{DEFAULT_BASE, DEFAULT_BOUNDARY};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of the position allocator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Branching factor used for new path levels
    pub base: i64,

    /// Step used when inserting before the first character
    pub boundary: i64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            boundary: DEFAULT_BOUNDARY,
        }
    }
}

/// Configuration for a document session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub allocator: AllocatorConfig,

    /// Period of the outgoing batch flush
    pub flush_interval_ms: u64,

    /// Period of the local caret probe
    pub caret_probe_interval_ms: u64,

    /// First delay before reconnecting after the connection closed
    pub reconnect_initial_delay_ms: u64,

    /// Upper bound for the doubling reconnect delay
    pub reconnect_max_delay_ms: u64,

    /// Send buffered operations one last time when shutting down while open
    pub flush_on_shutdown: bool,

    /// Number of colors participants are spread across
    pub palette_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            allocator: AllocatorConfig::default(),
            flush_interval_ms: 200,
            caret_probe_interval_ms: 100,
            reconnect_initial_delay_ms: 250,
            reconnect_max_delay_ms: 5_000,
            flush_on_shutdown: true,
            palette_size: 12,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters the allocator or timers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.allocator.base < 2 {
            return Err(SyncError::Config(format!(
                "allocator.base must be at least 2, got {}",
                self.allocator.base
            )));
        }
        if self.allocator.boundary < 1 {
            return Err(SyncError::Config(format!(
                "allocator.boundary must be at least 1, got {}",
                self.allocator.boundary
            )));
        }
        if self.flush_interval_ms == 0 || self.caret_probe_interval_ms == 0 {
            return Err(SyncError::Config(
                "flush and caret probe intervals must be non-zero".to_string(),
            ));
        }
        if self.reconnect_initial_delay_ms == 0
            || self.reconnect_max_delay_ms < self.reconnect_initial_delay_ms
        {
            return Err(SyncError::Config(format!(
                "reconnect delays must satisfy 0 < initial ({}) <= max ({})",
                self.reconnect_initial_delay_ms, self.reconnect_max_delay_ms
            )));
        }
        if self.palette_size == 0 {
            return Err(SyncError::Config("palette_size must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn caret_probe_interval(&self) -> Duration {
        Duration::from_millis(self.caret_probe_interval_ms)
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }
}
