use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::HearthError;
use crate::event::{Event, EventBus, LogEntry, LogLevel, SecurityAlert, StatusChange, Tick};
use crate::metrics::EngineMetrics;

use super::{models, LastReading, ModelState, Sensor, SensorStatus};

/// Battery percentage below which a warning is emitted (once per discharge).
const LOW_BATTERY_THRESHOLD: f64 = 10.0;

/// Owns every sensor and its mutable state.
///
/// The table is the single writer context for sensors: all mutation goes
/// through these methods, and every read handed out is a clone snapshot of
/// the last committed tick. Constructed once at process start and passed by
/// reference — there is no ambient lookup.
pub struct SensorRegistry {
    sensors: DashMap<String, Sensor>,
    bus: Arc<EventBus>,
    metrics: EngineMetrics,
}

impl SensorRegistry {
    pub fn new(bus: Arc<EventBus>, metrics: EngineMetrics) -> Self {
        Self {
            sensors: DashMap::new(),
            bus,
            metrics,
        }
    }

    /// Add a sensor. Fails with `DuplicateId` if the id is taken.
    pub fn register(&self, sensor: Sensor) -> Result<(), HearthError> {
        match self.sensors.entry(sensor.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(HearthError::DuplicateId(sensor.id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!(
                    sensor_id = %sensor.id,
                    sensor_type = %sensor.sensor_type,
                    room = %sensor.location.room,
                    "Sensor registered"
                );
                slot.insert(sensor);
                Ok(())
            }
        }
    }

    /// Remove a sensor, returning its final state.
    pub fn remove(&self, sensor_id: &str) -> Result<Sensor, HearthError> {
        let (_, sensor) = self
            .sensors
            .remove(sensor_id)
            .ok_or_else(|| HearthError::NotFound(sensor_id.to_string()))?;
        info!(sensor_id = %sensor_id, "Sensor removed");
        Ok(sensor)
    }

    /// Snapshot of a single sensor, reflecting the last committed tick.
    pub fn get(&self, sensor_id: &str) -> Result<Sensor, HearthError> {
        self.sensors
            .get(sensor_id)
            .map(|s| s.clone())
            .ok_or_else(|| HearthError::NotFound(sensor_id.to_string()))
    }

    /// All sensors, ordered by id.
    pub fn list(&self) -> Vec<Sensor> {
        let mut sensors: Vec<Sensor> = self.sensors.iter().map(|s| s.clone()).collect();
        sensors.sort_by(|a, b| a.id.cmp(&b.id));
        sensors
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Enable or disable reading production for a sensor.
    pub fn set_active(&self, sensor_id: &str, active: bool) -> Result<(), HearthError> {
        let mut sensor = self
            .sensors
            .get_mut(sensor_id)
            .ok_or_else(|| HearthError::NotFound(sensor_id.to_string()))?;
        sensor.active = active;
        debug!(sensor_id = %sensor_id, active = active, "Sensor active flag changed");
        Ok(())
    }

    /// Restore battery to 100% and bring an Offline sensor back Online.
    pub fn recharge(&self, sensor_id: &str) -> Result<(), HearthError> {
        let event = {
            let mut sensor = self
                .sensors
                .get_mut(sensor_id)
                .ok_or_else(|| HearthError::NotFound(sensor_id.to_string()))?;
            sensor.battery_level = 100.0;
            sensor.low_battery_warned = false;
            if sensor.status == SensorStatus::Offline {
                sensor.status = SensorStatus::Online;
                Some(Event::StatusChanged(StatusChange {
                    source_id: sensor.id.clone(),
                    from: SensorStatus::Offline.as_str().to_string(),
                    to: SensorStatus::Online.as_str().to_string(),
                    timestamp: chrono::Utc::now(),
                }))
            } else {
                None
            }
        };
        if let Some(event) = event {
            self.bus.publish(event);
        }
        info!(sensor_id = %sensor_id, "Sensor recharged");
        Ok(())
    }

    /// Clear a latched smoke alarm.
    pub fn clear_alarm(&self, sensor_id: &str) -> Result<(), HearthError> {
        let mut sensor = self
            .sensors
            .get_mut(sensor_id)
            .ok_or_else(|| HearthError::NotFound(sensor_id.to_string()))?;
        if let ModelState::Smoke { alarm_latched, .. } = &mut sensor.model_state {
            if *alarm_latched {
                *alarm_latched = false;
                info!(sensor_id = %sensor_id, "Latched alarm cleared");
            }
        }
        Ok(())
    }

    /// Remove every sensor (project load replaces the layout wholesale).
    pub fn clear(&self) {
        self.sensors.clear();
    }

    /// Reset the whole simulation: full batteries, cleared alarms, all
    /// sensors back Online, statistics zeroed.
    pub fn reset(&self) {
        for mut sensor in self.sensors.iter_mut() {
            sensor.battery_level = 100.0;
            sensor.low_battery_warned = false;
            sensor.status = SensorStatus::Online;
            sensor.last_reading = None;
            sensor.model_state = models::initial_state(sensor.sensor_type, &sensor.config);
        }
        self.metrics.reset();
        info!("Sensor registry reset");
    }

    /// Advance every producing sensor by one tick.
    ///
    /// Sequential per cycle: sensors are numerous but cheap. Per-sensor
    /// reading order is strictly the tick order; cross-sensor interleaving
    /// is unspecified.
    pub fn on_tick(&self, tick: &Tick) {
        let mut events: Vec<Event> = Vec::new();

        for mut sensor in self.sensors.iter_mut() {
            if !sensor.active || sensor.status != SensorStatus::Online {
                continue;
            }

            // Battery drains proportionally to virtual elapsed time.
            let drain = sensor.config.get_f64("battery_drain", 0.01) * tick.delta_secs;
            sensor.battery_level = (sensor.battery_level - drain).max(0.0);

            if sensor.battery_level <= 0.0 {
                sensor.status = SensorStatus::Offline;
                warn!(sensor_id = %sensor.id, "Battery exhausted, sensor offline");
                events.push(Event::StatusChanged(StatusChange {
                    source_id: sensor.id.clone(),
                    from: SensorStatus::Online.as_str().to_string(),
                    to: SensorStatus::Offline.as_str().to_string(),
                    timestamp: tick.virtual_time,
                }));
                continue;
            }

            if sensor.battery_level <= LOW_BATTERY_THRESHOLD && !sensor.low_battery_warned {
                sensor.low_battery_warned = true;
                events.push(Event::LogEmitted(LogEntry::new(
                    sensor.id.clone(),
                    LogLevel::Warning,
                    format!("battery low: {:.1}%", sensor.battery_level),
                )));
            }

            let output = models::step(&mut sensor, tick.virtual_time);
            sensor.last_reading = Some(LastReading {
                value: output.value,
                virtual_time: tick.virtual_time,
            });
            self.metrics.record_reading();
            events.push(Event::SensorReading(crate::event::SensorReading {
                sensor_id: sensor.id.clone(),
                sensor_type: sensor.sensor_type,
                value: output.value,
                virtual_time: tick.virtual_time,
            }));

            if let Some(message) = output.alert {
                self.metrics.record_security_alert();
                events.push(Event::SecurityAlert(SecurityAlert {
                    source_id: sensor.id.clone(),
                    severity: LogLevel::Warning,
                    message,
                    timestamp: tick.virtual_time,
                }));
            }
        }

        for event in events {
            self.bus.publish(event);
        }
    }
}
