//! Virtual clock and the scheduling loop that drives it.
//!
//! The clock owns a monotonically advancing virtual timestamp and a speed
//! multiplier in `[0, 10]`. `advance` is called on a fixed wall-clock cadence
//! from a single scheduling task and never blocks.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::HearthError;
use crate::event::{Event, EventBus, Tick};
use crate::metrics::EngineMetrics;
use crate::sensors::SensorRegistry;

/// Highest accepted speed multiplier.
pub const MAX_SPEED: f64 = 10.0;

struct ClockState {
    virtual_time: DateTime<Utc>,
    speed: f64,
    /// Multiplier restored by `resume()` after a `pause()`.
    prior_speed: f64,
}

/// Monotonic virtual clock with a configurable speed multiplier.
///
/// Safe to share: commands (`set_speed`, `pause`, `resume`) may run
/// concurrently with the tick loop; an internal lock keeps each operation
/// atomic with respect to `advance`.
pub struct SimClock {
    state: RwLock<ClockState>,
}

impl SimClock {
    pub fn new(initial_speed: f64) -> Result<Self, HearthError> {
        validate_speed(initial_speed)?;
        Ok(Self {
            state: RwLock::new(ClockState {
                virtual_time: Utc::now(),
                speed: initial_speed,
                prior_speed: if initial_speed > 0.0 { initial_speed } else { 1.0 },
            }),
        })
    }

    /// Advance virtual time by `wall_delta * speed`.
    ///
    /// Returns `None` while paused (speed 0) — no tick is emitted.
    pub fn advance(&self, wall_delta: Duration) -> Option<Tick> {
        let mut state = self.state.write().unwrap();
        if state.speed == 0.0 {
            return None;
        }

        let delta_secs = wall_delta.as_secs_f64() * state.speed;
        state.virtual_time += ChronoDuration::microseconds((delta_secs * 1e6) as i64);

        Some(Tick {
            virtual_time: state.virtual_time,
            delta_secs,
        })
    }

    /// Set the speed multiplier. Values outside `[0, 10]` are rejected with
    /// `InvalidConfig` and the multiplier is left unchanged.
    pub fn set_speed(&self, speed: f64) -> Result<(), HearthError> {
        validate_speed(speed)?;
        let mut state = self.state.write().unwrap();
        if state.speed > 0.0 {
            state.prior_speed = state.speed;
        }
        state.speed = speed;
        debug!(speed = speed, "Simulation speed set");
        Ok(())
    }

    /// Equivalent to `set_speed(0)`, remembering the prior multiplier.
    pub fn pause(&self) {
        let mut state = self.state.write().unwrap();
        if state.speed > 0.0 {
            state.prior_speed = state.speed;
            state.speed = 0.0;
            info!("Simulation paused");
        }
    }

    /// Restore the multiplier in effect before the last `pause()`.
    pub fn resume(&self) {
        let mut state = self.state.write().unwrap();
        if state.speed == 0.0 {
            state.speed = state.prior_speed;
            info!(speed = state.speed, "Simulation resumed");
        }
    }

    pub fn speed(&self) -> f64 {
        self.state.read().unwrap().speed
    }

    pub fn virtual_time(&self) -> DateTime<Utc> {
        self.state.read().unwrap().virtual_time
    }
}

pub(crate) fn validate_speed(speed: f64) -> Result<(), HearthError> {
    if !speed.is_finite() || !(0.0..=MAX_SPEED).contains(&speed) {
        return Err(HearthError::InvalidConfig(format!(
            "speed multiplier must be within [0, {}], got {}",
            MAX_SPEED, speed
        )));
    }
    Ok(())
}

/// Run the simulation scheduling loop until `shutdown` flips to true.
///
/// A single task drives the clock at `tick_interval` wall cadence; each
/// advance publishes a `Tick` and runs the registry's sequential sensor
/// update. The loop itself never blocks on subscribers.
pub async fn run_simulation(
    clock: Arc<SimClock>,
    registry: Arc<SensorRegistry>,
    bus: Arc<EventBus>,
    metrics: EngineMetrics,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // tokio::time::interval panics on a zero period.
    if tick_interval.is_zero() {
        error!("Tick interval must be non-zero, simulation loop not started");
        return;
    }

    info!(
        tick_interval_ms = tick_interval.as_millis() as u64,
        speed = clock.speed(),
        "Simulation loop starting"
    );

    let mut timer = tokio::time::interval(tick_interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Consume the immediate first tick so the first delta is a full interval.
    timer.tick().await;
    let mut last_wall = Instant::now();

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let now = Instant::now();
                let wall_delta = now - last_wall;
                last_wall = now;

                if let Some(tick) = clock.advance(wall_delta) {
                    metrics.record_tick();
                    bus.publish(Event::Tick(tick.clone()));
                    registry.on_tick(&tick);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Simulation loop stopped");
}
