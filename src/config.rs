//! The engine's configuration record.
//!
//! The engine consumes an already-populated [`EngineConfig`]; parsing a file
//! into one is the caller's concern. The struct derives `Deserialize` with
//! per-field defaults so any format the caller picks can fill it partially.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum depth a discovered request may carry and still be admitted.
    pub grab_max_depth: u32,
    pub request_chan_capacity: usize,
    pub response_chan_capacity: usize,
    pub item_chan_capacity: usize,
    pub error_chan_capacity: usize,
    pub downloader_pool_size: u32,
    pub analyzer_pool_size: u32,
    /// Consecutive idle checks before the monitor considers stopping.
    /// Clamped up to 1000 by the monitor.
    pub max_idle_count: usize,
    /// Interval between the monitor's idle checks. Clamped up to 1 ms.
    pub check_interval: Duration,
    /// Total per-request timeout the plugin's HTTP client should carry.
    pub request_timeout: Duration,
    /// Selects the plugin by name.
    pub plugin_key: String,
    /// URL schemes admission control accepts. Lowercase.
    pub allowed_schemes: Vec<String>,
    /// How often the feeder moves spilled requests into the request queue.
    pub feed_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grab_max_depth: 3,
            request_chan_capacity: 100,
            response_chan_capacity: 100,
            item_chan_capacity: 100,
            error_chan_capacity: 100,
            downloader_pool_size: num_cpus::get().clamp(2, 16) as u32,
            analyzer_pool_size: num_cpus::get().clamp(2, 8) as u32,
            max_idle_count: 1000,
            check_interval: Duration::from_millis(1),
            request_timeout: Duration::from_secs(30),
            plugin_key: String::new(),
            allowed_schemes: vec!["http".to_string()],
            feed_interval: Duration::from_millis(10),
        }
    }
}

impl EngineConfig {
    /// The start-up validation the scheduler performs before touching any
    /// resource.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.grab_max_depth == 0 {
            return Err(EngineError::Configuration(
                "grab_max_depth must be greater than 0".to_string(),
            ));
        }
        if self.request_chan_capacity == 0
            || self.response_chan_capacity == 0
            || self.item_chan_capacity == 0
            || self.error_chan_capacity == 0
        {
            return Err(EngineError::Configuration(
                "queue capacities must be greater than 0".to_string(),
            ));
        }
        if self.downloader_pool_size == 0 || self.analyzer_pool_size == 0 {
            return Err(EngineError::Configuration(
                "pool sizes must be greater than 0".to_string(),
            ));
        }
        if self.allowed_schemes.is_empty() {
            return Err(EngineError::Configuration(
                "allowed_schemes must not be empty".to_string(),
            ));
        }
        if self.feed_interval.is_zero() {
            return Err(EngineError::Configuration(
                "feed_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
