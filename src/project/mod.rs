//! Project save/load and log export.
//!
//! A project file is a versioned JSON document carrying sensor records and
//! simulation settings. Saving and loading round-trips without loss; loading
//! replaces the registry contents and restores the clock settings.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::clock::SimClock;
use crate::event::LogEntry;
use crate::sensors::{Location, Sensor, SensorConfig, SensorRegistry, SensorType};

pub const PROJECT_VERSION: &str = "1.0";

/// Persisted sensor shape: `{id, type, location, config, active}` plus the
/// display name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    pub location: Location,
    pub config: SensorConfig,
    pub active: bool,
}

impl SensorRecord {
    pub fn from_sensor(sensor: &Sensor) -> Self {
        Self {
            id: sensor.id.clone(),
            name: sensor.name.clone(),
            sensor_type: sensor.sensor_type,
            location: sensor.location.clone(),
            config: sensor.config.clone(),
            active: sensor.active,
        }
    }

    pub fn into_sensor(self) -> Sensor {
        let mut sensor = Sensor::with_id(
            self.id,
            self.sensor_type,
            self.name,
            self.location,
            self.config,
        );
        sensor.active = self.active;
        sensor
    }
}

/// Simulation settings stored alongside the sensor layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub speed: f64,
    pub tick_interval_ms: u64,
}

/// Versioned project document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: String,
    pub created: DateTime<Utc>,
    pub sensors: Vec<SensorRecord>,
    pub settings: ProjectSettings,
}

impl ProjectFile {
    /// Capture the current registry and clock state.
    pub fn capture(registry: &SensorRegistry, clock: &SimClock, tick_interval_ms: u64) -> Self {
        Self {
            version: PROJECT_VERSION.to_string(),
            created: Utc::now(),
            sensors: registry.list().iter().map(SensorRecord::from_sensor).collect(),
            settings: ProjectSettings {
                speed: clock.speed(),
                tick_interval_ms,
            },
        }
    }
}

/// Save the current project to a JSON file.
pub fn save_project(
    path: &Path,
    registry: &SensorRegistry,
    clock: &SimClock,
    tick_interval_ms: u64,
) -> Result<()> {
    let project = ProjectFile::capture(registry, clock, tick_interval_ms);
    let json = serde_json::to_string_pretty(&project).context("Failed to serialize project")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write project file {}", path.display()))?;
    info!(
        path = %path.display(),
        sensors = project.sensors.len(),
        "Project saved"
    );
    Ok(())
}

/// Load a project file from disk.
pub fn load_project(path: &Path) -> Result<ProjectFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read project file {}", path.display()))?;
    let project: ProjectFile =
        serde_json::from_str(&contents).context("Failed to parse project file")?;
    Ok(project)
}

/// Replace the registry contents and clock settings with a loaded project.
///
/// The project is validated in full before the registry or clock is touched,
/// so a bad file leaves the current layout in place.
pub fn apply_project(
    project: ProjectFile,
    registry: &Arc<SensorRegistry>,
    clock: &SimClock,
) -> Result<()> {
    crate::clock::validate_speed(project.settings.speed)
        .context("Project file carries an invalid speed")?;
    let mut ids = HashSet::new();
    for record in &project.sensors {
        if !ids.insert(record.id.as_str()) {
            bail!("Duplicate sensor id in project file: {}", record.id);
        }
    }

    registry.clear();
    let sensor_count = project.sensors.len();
    for record in project.sensors {
        registry
            .register(record.into_sensor())
            .context("Duplicate sensor id in project file")?;
    }
    clock
        .set_speed(project.settings.speed)
        .context("Project file carries an invalid speed")?;
    info!(sensors = sensor_count, "Project loaded");
    Ok(())
}

/// Export log entries as a JSON array of `{timestamp, level, source, message}`
/// records ([`LogEntry`] serializes to exactly that shape).
pub fn export_logs(path: &Path, entries: &[LogEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("Failed to serialize log export")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write log export {}", path.display()))?;
    info!(path = %path.display(), entries = entries.len(), "Logs exported");
    Ok(())
}
