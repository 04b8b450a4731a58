//! Type-specific reading models.
//!
//! Continuous sensors apply a bounded random walk: per tick the value moves
//! by at most `max_drift`, split between drift and accuracy-scaled noise,
//! then clamps to the configured physical range. Binary sensors flip with a
//! configured per-tick probability; smoke alarms latch until cleared.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::{ModelState, ReadingValue, Sensor, SensorConfig, SensorType};

/// Outcome of advancing a sensor model by one tick.
pub(crate) struct ModelOutput {
    pub value: ReadingValue,
    /// Security-relevant condition raised by this step, if any.
    pub alert: Option<String>,
}

/// Initial model state for a freshly created sensor.
pub(crate) fn initial_state(sensor_type: SensorType, config: &SensorConfig) -> ModelState {
    match sensor_type {
        SensorType::Motion => ModelState::Motion {
            detected: false,
            last_motion: None,
        },
        SensorType::DoorWindow => ModelState::Door { open: false },
        SensorType::Smoke => ModelState::Smoke {
            level: 0.0,
            alarm_latched: false,
        },
        _ => ModelState::Continuous {
            value: config.get_f64("base_value", 0.0),
        },
    }
}

/// Advance the sensor's model by one tick and produce a reading.
pub(crate) fn step(sensor: &mut Sensor, virtual_time: DateTime<Utc>) -> ModelOutput {
    let mut rng = rand::thread_rng();
    let config = sensor.config.clone();

    match &mut sensor.model_state {
        ModelState::Continuous { value } => {
            let min = config.get_f64("min_value", f64::MIN);
            let max = config.get_f64("max_value", f64::MAX);
            let max_drift = config.get_f64("max_drift", 1.0).abs();
            let accuracy = config.get_f64("accuracy", 0.0).abs().min(max_drift);

            // Drift and noise are jointly bounded by max_drift, so two
            // consecutive readings never differ by more than max_drift.
            let drift_budget = max_drift - accuracy;
            let drift = if drift_budget > 0.0 {
                rng.gen_range(-drift_budget..=drift_budget)
            } else {
                0.0
            };
            let noise = if accuracy > 0.0 {
                rng.gen_range(-accuracy..=accuracy)
            } else {
                0.0
            };

            *value = (*value + drift + noise).clamp(min, max);
            ModelOutput {
                value: ReadingValue::Float(*value),
                alert: None,
            }
        }

        ModelState::Motion {
            detected,
            last_motion,
        } => {
            let trigger_prob = config.get_f64("trigger_probability", 0.1);
            let timeout = config.get_f64("timeout_secs", 30.0);

            if rng.gen_bool(trigger_prob.clamp(0.0, 1.0)) {
                *detected = true;
                *last_motion = Some(virtual_time);
            } else if let Some(since) = *last_motion {
                let elapsed = (virtual_time - since).num_milliseconds() as f64 / 1000.0;
                if elapsed > timeout {
                    *detected = false;
                    *last_motion = None;
                }
            }

            ModelOutput {
                value: ReadingValue::Bool(*detected),
                alert: None,
            }
        }

        ModelState::Door { open } => {
            let change_prob = config.get_f64("state_change_probability", 0.05);
            let tamper_prob = config.get_f64("tamper_probability", 0.001);

            if rng.gen_bool(change_prob.clamp(0.0, 1.0)) {
                *open = !*open;
            }

            let alert = if rng.gen_bool(tamper_prob.clamp(0.0, 1.0)) {
                Some("tamper detected".to_string())
            } else {
                None
            };

            ModelOutput {
                value: ReadingValue::Bool(*open),
                alert,
            }
        }

        ModelState::Smoke {
            level,
            alarm_latched,
        } => {
            let alarm_prob = config.get_f64("alarm_probability", 0.001);
            let threshold = config.get_f64("smoke_threshold", 50.0);

            // Keep the alarm level range valid for any configured threshold.
            let floor = threshold.clamp(60.0, 99.0);

            let mut alert = None;
            if rng.gen_bool(alarm_prob.clamp(0.0, 1.0)) {
                *level = rng.gen_range(floor..=100.0);
                if !*alarm_latched {
                    // Latched: stays triggered until explicitly cleared.
                    *alarm_latched = true;
                    alert = Some(format!("smoke alarm triggered at {:.0} ppm", level));
                }
            } else {
                *level = (*level - rng.gen_range(1.0..=5.0)).max(0.0);
            }

            ModelOutput {
                value: ReadingValue::Bool(*alarm_latched),
                alert,
            }
        }
    }
}
