use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use hearth::clock::{run_simulation, SimClock};
use hearth::config::HearthConfig;
use hearth::event::{Event, EventBus};
use hearth::metrics::EngineMetrics;
use hearth::sensors::{Location, Sensor, SensorConfig, SensorRegistry, SensorType};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=info".into()),
        )
        .init();

    let config = match hearth::config::load_config("hearth.toml") {
        Ok(config) => config,
        Err(_) => {
            info!("No hearth.toml found, using defaults");
            HearthConfig::default()
        }
    };

    info!(
        tick_interval_ms = config.simulation.tick_interval_ms,
        speed = config.simulation.speed,
        "Hearth starting"
    );

    let bus = Arc::new(EventBus::new(config.bus.capacity));
    let metrics = EngineMetrics::new();
    let clock = Arc::new(SimClock::new(config.simulation.speed)?);
    let registry = Arc::new(SensorRegistry::new(Arc::clone(&bus), metrics.clone()));

    seed_demo_layout(&registry)?;

    // Console subscriber: print security alerts and status changes
    let mut events = bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::SecurityAlert(alert) => {
                    info!(source = %alert.source_id, message = %alert.message, "Security alert");
                }
                Event::StatusChanged(change) => {
                    info!(source = %change.source_id, from = %change.from, to = %change.to, "Status changed");
                }
                _ => {}
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sim = tokio::spawn(run_simulation(
        Arc::clone(&clock),
        Arc::clone(&registry),
        Arc::clone(&bus),
        metrics.clone(),
        Duration::from_millis(config.simulation.tick_interval_ms),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = sim.await;
    printer.abort();

    let stats = metrics.snapshot();
    info!(
        ticks = stats.ticks,
        readings = stats.readings,
        alerts = stats.security_alerts,
        dropped = bus.dropped_total(),
        "Hearth stopped"
    );

    Ok(())
}

/// A small default layout so the binary does something out of the box.
fn seed_demo_layout(registry: &SensorRegistry) -> Result<()> {
    let sensors = [
        (SensorType::Temperature, "Living Room Temp", "living_room"),
        (SensorType::Humidity, "Bathroom Humidity", "bathroom"),
        (SensorType::Motion, "Hallway Motion", "hallway"),
        (SensorType::DoorWindow, "Front Door", "entrance"),
        (SensorType::Smoke, "Kitchen Smoke", "kitchen"),
    ];

    for (sensor_type, name, room) in sensors {
        registry.register(Sensor::new(
            sensor_type,
            name,
            Location {
                room: room.to_string(),
                x: 0.0,
                y: 0.0,
            },
            SensorConfig::new(),
        ))?;
    }

    Ok(())
}
