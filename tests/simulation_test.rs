// End-to-end tests for the simulation loop: clock, registry, and bus wired
// together the way the binary wires them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use hearth::clock::{run_simulation, SimClock};
use hearth::event::{Event, EventBus, EventFilter, EventKind, Subscription};
use hearth::metrics::EngineMetrics;
use hearth::sensors::{Location, Sensor, SensorConfig, SensorRegistry, SensorType};

struct Harness {
    clock: Arc<SimClock>,
    registry: Arc<SensorRegistry>,
    bus: Arc<EventBus>,
    metrics: EngineMetrics,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: tokio::task::JoinHandle<()>,
}

fn spawn_engine(speed: f64, tick_interval: Duration) -> Harness {
    let bus = Arc::new(EventBus::new(4096));
    let metrics = EngineMetrics::new();
    let clock = Arc::new(SimClock::new(speed).unwrap());
    let registry = Arc::new(SensorRegistry::new(bus.clone(), metrics.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(run_simulation(
        clock.clone(),
        registry.clone(),
        bus.clone(),
        metrics.clone(),
        tick_interval,
        shutdown_rx,
    ));
    Harness {
        clock,
        registry,
        bus,
        metrics,
        shutdown_tx,
        loop_handle,
    }
}

impl Harness {
    async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.loop_handle.await;
    }
}

fn temperature_sensor(id: &str) -> Sensor {
    let mut config = SensorConfig::new();
    config.set("battery_drain", 0.0);
    Sensor::with_id(
        id,
        SensorType::Temperature,
        "Living Room Temperature",
        Location {
            room: "living_room".to_string(),
            x: 1.0,
            y: 2.0,
        },
        config,
    )
}

fn drain(sub: &mut Subscription) -> Vec<Event> {
    let mut out = Vec::new();
    while let Some(event) = sub.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_running_engine_produces_ticks_and_readings() {
    let harness = spawn_engine(5.0, Duration::from_millis(10));
    let mut readings = harness
        .bus
        .subscribe_filtered(EventFilter::Kind(EventKind::SensorReading));
    harness.registry.register(temperature_sensor("temp_1")).unwrap();

    let start_virtual = harness.clock.virtual_time();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = harness.metrics.snapshot();
    assert!(snapshot.ticks > 0);
    assert!(snapshot.readings > 0);

    let events = drain(&mut readings);
    assert!(!events.is_empty());
    for event in &events {
        match event {
            Event::SensorReading(reading) => assert_eq!(reading.sensor_id, "temp_1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // Virtual time runs 5x wall time; even with scheduling slack 300ms of
    // wall time must yield well over 500ms of virtual time.
    let virtual_elapsed = harness.clock.virtual_time() - start_virtual;
    assert!(virtual_elapsed.num_milliseconds() > 500);

    let sensor = harness.registry.get("temp_1").unwrap();
    assert!(sensor.last_reading.is_some());

    harness.stop().await;
}

#[tokio::test]
async fn test_paused_engine_produces_no_events() {
    let harness = spawn_engine(0.0, Duration::from_millis(10));
    let mut events = harness.bus.subscribe_filtered(EventFilter::Kinds(vec![
        EventKind::Tick,
        EventKind::SensorReading,
    ]));
    harness.registry.register(temperature_sensor("temp_1")).unwrap();

    let start_virtual = harness.clock.virtual_time();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(harness.metrics.snapshot().ticks, 0);
    assert_eq!(harness.clock.virtual_time(), start_virtual);

    // Paused time also freezes battery drain and readings.
    let sensor = harness.registry.get("temp_1").unwrap();
    assert!(sensor.last_reading.is_none());
    assert_eq!(sensor.battery_level, 100.0);

    harness.stop().await;
}

#[tokio::test]
async fn test_resuming_paused_engine_restarts_event_flow() {
    let harness = spawn_engine(0.0, Duration::from_millis(10));
    let mut ticks = harness
        .bus
        .subscribe_filtered(EventFilter::Kind(EventKind::Tick));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut ticks).is_empty());

    harness.clock.set_speed(2.0).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!drain(&mut ticks).is_empty());

    harness.stop().await;
}
