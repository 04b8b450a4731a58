use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Tracks simulation statistics for UI polling
#[derive(Clone)]
pub struct EngineMetrics {
    /// Ticks emitted (lifetime counter)
    ticks: Arc<AtomicU64>,

    /// Sensor readings produced
    readings: Arc<AtomicU64>,

    /// Security alerts raised
    security_alerts: Arc<AtomicU64>,
}

/// Point-in-time statistics snapshot
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub readings: u64,
    pub security_alerts: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicU64::new(0)),
            readings: Arc::new(AtomicU64::new(0)),
            security_alerts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self) {
        self.readings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_security_alert(&self) {
        self.security_alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            readings: self.readings.load(Ordering::Relaxed),
            security_alerts: self.security_alerts.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters (simulation reset)
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.readings.store(0, Ordering::Relaxed);
        self.security_alerts.store(0, Ordering::Relaxed);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
