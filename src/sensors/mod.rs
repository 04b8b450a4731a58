use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

mod models;
mod registry;
#[cfg(test)]
mod tests;

pub use registry::SensorRegistry;

/// Sensor type tag. Behavior dispatches on this tag instead of an
/// inheritance hierarchy: continuous types share the bounded random-walk
/// model, binary types share probabilistic state transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
    Light,
    Proximity,
    Motion,
    DoorWindow,
    Smoke,
}

impl SensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Pressure => "pressure",
            SensorType::Light => "light",
            SensorType::Proximity => "proximity",
            SensorType::Motion => "motion",
            SensorType::DoorWindow => "door_window",
            SensorType::Smoke => "smoke",
        }
    }

    /// Continuous sensors drift; binary sensors flip state.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            SensorType::Temperature
                | SensorType::Humidity
                | SensorType::Pressure
                | SensorType::Light
                | SensorType::Proximity
        )
    }

    /// Type-specific default configuration entries.
    pub fn default_config(&self) -> SensorConfig {
        let mut config = SensorConfig::new();
        match self {
            SensorType::Temperature => {
                config.set("base_value", 22.0);
                config.set("min_value", -40.0);
                config.set("max_value", 85.0);
                config.set("accuracy", 0.5);
                config.set("max_drift", 0.5);
                config.set_str("unit", "celsius");
            }
            SensorType::Humidity => {
                config.set("base_value", 45.0);
                config.set("min_value", 0.0);
                config.set("max_value", 100.0);
                config.set("accuracy", 1.0);
                config.set("max_drift", 2.0);
                config.set_str("unit", "percent");
            }
            SensorType::Pressure => {
                config.set("base_value", 1013.0);
                config.set("min_value", 950.0);
                config.set("max_value", 1050.0);
                config.set("accuracy", 0.5);
                config.set("max_drift", 1.0);
                config.set_str("unit", "hpa");
            }
            SensorType::Light => {
                config.set("base_value", 500.0);
                config.set("min_value", 0.0);
                config.set("max_value", 10000.0);
                config.set("accuracy", 10.0);
                config.set("max_drift", 100.0);
                config.set_str("unit", "lux");
            }
            SensorType::Proximity => {
                config.set("base_value", 2.5);
                config.set("min_value", 0.0);
                config.set("max_value", 5.0);
                config.set("accuracy", 0.05);
                config.set("max_drift", 0.5);
                config.set_str("unit", "meters");
            }
            SensorType::Motion => {
                config.set("trigger_probability", 0.1);
                config.set("timeout_secs", 30.0);
                config.set("sensitivity", 0.7);
                config.set("detection_range", 5.0);
            }
            SensorType::DoorWindow => {
                config.set("state_change_probability", 0.05);
                config.set("tamper_probability", 0.001);
            }
            SensorType::Smoke => {
                config.set("alarm_probability", 0.001);
                config.set("smoke_threshold", 50.0);
                config.set_str("sensitivity", "medium");
            }
        }
        config.set("battery_drain", 0.01);
        config
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor operational status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Online,
    Offline,
    Error,
    Maintenance,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Online => "online",
            SensorStatus::Offline => "offline",
            SensorStatus::Error => "error",
            SensorStatus::Maintenance => "maintenance",
        }
    }
}

/// Uniform configuration map. Fields vary by sensor type but are accessed
/// through typed getters with per-call defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorConfig(pub HashMap<String, Value>);

impl SensorConfig {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), Value::from(value));
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), Value::from(value));
    }

    /// Layer `overrides` on top of this config.
    pub fn merge(&mut self, overrides: &SensorConfig) {
        for (k, v) in &overrides.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

/// Room placement plus canvas coordinates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub room: String,
    pub x: f64,
    pub y: f64,
}

/// Typed value produced by a reading model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Bool(bool),
    Float(f64),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Float(v) => Some(*v),
            ReadingValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ReadingValue::Bool(v) => Some(*v),
            ReadingValue::Float(_) => None,
        }
    }
}

/// Last committed reading for a sensor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastReading {
    pub value: ReadingValue,
    pub virtual_time: DateTime<Utc>,
}

/// Mutable per-type model state, advanced once per tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelState {
    /// Continuous sensors walk a current value inside their physical range.
    Continuous { value: f64 },
    /// PIR motion: latched for `timeout_secs` of virtual time after a trigger.
    Motion {
        detected: bool,
        last_motion: Option<DateTime<Utc>>,
    },
    /// Door/window contact.
    Door { open: bool },
    /// Smoke level with a latched alarm, held until explicitly cleared.
    Smoke { level: f64, alarm_latched: bool },
}

/// A virtual sensor: identity, type tag, uniform config, and mutable state.
///
/// Owned exclusively by the [`SensorRegistry`]; everything handed out is a
/// clone snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Sensor {
    pub id: String,
    pub name: String,
    pub sensor_type: SensorType,
    pub location: Location,
    pub config: SensorConfig,
    pub active: bool,
    /// 0–100. Only decreases while active; recharge is an explicit command.
    pub battery_level: f64,
    pub status: SensorStatus,
    pub last_reading: Option<LastReading>,
    pub(crate) model_state: ModelState,
    pub(crate) low_battery_warned: bool,
}

impl Sensor {
    /// Create a sensor with type defaults layered under `config` overrides.
    pub fn new(
        sensor_type: SensorType,
        name: impl Into<String>,
        location: Location,
        config: SensorConfig,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), sensor_type, name, location, config)
    }

    pub fn with_id(
        id: impl Into<String>,
        sensor_type: SensorType,
        name: impl Into<String>,
        location: Location,
        config: SensorConfig,
    ) -> Self {
        let mut merged = sensor_type.default_config();
        merged.merge(&config);
        let model_state = models::initial_state(sensor_type, &merged);
        Self {
            id: id.into(),
            name: name.into(),
            sensor_type,
            location,
            config: merged,
            active: true,
            battery_level: 100.0,
            status: SensorStatus::Online,
            last_reading: None,
            model_state,
            low_battery_warned: false,
        }
    }

    /// True when the sensor should produce readings this tick.
    pub fn is_producing(&self) -> bool {
        self.active && self.status == SensorStatus::Online
    }
}
