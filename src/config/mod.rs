use serde::Deserialize;

use crate::error::HearthError;

/// Complete engine configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HearthConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

impl HearthConfig {
    /// Reject values the engine cannot run with. The speed multiplier is
    /// checked separately by `SimClock::new`.
    pub fn validate(&self) -> Result<(), HearthError> {
        if self.simulation.tick_interval_ms == 0 {
            return Err(HearthError::InvalidConfig(
                "tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(HearthError::InvalidConfig(
                "bus capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Simulation loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Wall-clock cadence of the tick loop (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Initial speed multiplier, within [0, 10]
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_speed() -> f64 {
    1.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            speed: default_speed(),
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Per-subscriber delivery queue capacity (events)
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

fn default_bus_capacity() -> usize {
    1024
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<HearthConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: HearthConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
