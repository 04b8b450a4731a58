//! Manager configuration, loaded from TOML.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::component::ComponentDefinition;

#[derive(Clone, Debug, Deserialize)]
pub struct ManagerConfig {
    /// How long a starting component may take to report healthy.
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,
    /// How long a stopping worker gets to exit before it is terminated.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// Per-component log buffer size; oldest entries are evicted beyond it.
    #[serde(default = "default_log_buffer_capacity")]
    pub log_buffer_capacity: usize,
    /// Bound on the raw line channel between a worker and its monitor.
    #[serde(default = "default_line_channel_capacity")]
    pub line_channel_capacity: usize,
    /// Components registered at startup.
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

fn default_health_check_timeout_ms() -> u64 {
    5000
}

fn default_stop_grace_ms() -> u64 {
    2000
}

fn default_log_buffer_capacity() -> usize {
    1000
}

fn default_line_channel_capacity() -> usize {
    256
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            health_check_timeout_ms: default_health_check_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            log_buffer_capacity: default_log_buffer_capacity(),
            line_channel_capacity: default_line_channel_capacity(),
            components: Vec::new(),
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<ManagerConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ManagerConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
