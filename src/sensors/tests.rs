use super::*;
use crate::error::HearthError;
use crate::event::{Event, EventBus, EventFilter, EventKind, Tick};
use crate::metrics::EngineMetrics;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;

fn setup() -> (Arc<EventBus>, SensorRegistry) {
    let bus = Arc::new(EventBus::new(4096));
    let registry = SensorRegistry::new(Arc::clone(&bus), EngineMetrics::new());
    (bus, registry)
}

fn location() -> Location {
    Location {
        room: "living_room".to_string(),
        x: 100.0,
        y: 50.0,
    }
}

fn make_sensor(id: &str, sensor_type: SensorType) -> Sensor {
    Sensor::with_id(id, sensor_type, id, location(), SensorConfig::new())
}

fn tick_at(virtual_time: chrono::DateTime<Utc>, delta_secs: f64) -> Tick {
    Tick {
        virtual_time,
        delta_secs,
    }
}

/// Run `n` ticks of one virtual second each, returning the last virtual time.
fn run_ticks(registry: &SensorRegistry, n: usize) -> chrono::DateTime<Utc> {
    let mut vt = Utc::now();
    for _ in 0..n {
        vt += ChronoDuration::seconds(1);
        registry.on_tick(&tick_at(vt, 1.0));
    }
    vt
}

#[test]
fn test_register_rejects_duplicate_id() {
    let (_bus, registry) = setup();
    registry.register(make_sensor("temp_1", SensorType::Temperature)).unwrap();

    let result = registry.register(make_sensor("temp_1", SensorType::Humidity));
    assert_eq!(result, Err(HearthError::DuplicateId("temp_1".to_string())));
    // Original registration untouched.
    assert_eq!(registry.get("temp_1").unwrap().sensor_type, SensorType::Temperature);
}

#[test]
fn test_get_unknown_sensor_is_not_found() {
    let (_bus, registry) = setup();
    assert_eq!(
        registry.get("ghost"),
        Err(HearthError::NotFound("ghost".to_string()))
    );
    assert_eq!(
        registry.remove("ghost"),
        Err(HearthError::NotFound("ghost".to_string()))
    );
}

#[test]
fn test_list_is_ordered_by_id() {
    let (_bus, registry) = setup();
    for id in ["c_sensor", "a_sensor", "b_sensor"] {
        registry.register(make_sensor(id, SensorType::Temperature)).unwrap();
    }

    let ids: Vec<String> = registry.list().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["a_sensor", "b_sensor", "c_sensor"]);
}

#[test]
fn test_temperature_readings_within_range_and_drift_bound() {
    let (bus, registry) = setup();
    let mut config = SensorConfig::new();
    config.set("accuracy", 0.5);
    config.set("max_drift", 0.5);
    config.set("battery_drain", 0.0);
    registry
        .register(Sensor::with_id(
            "temp_1",
            SensorType::Temperature,
            "temp_1",
            location(),
            config,
        ))
        .unwrap();

    let mut sub = bus.subscribe_filtered(EventFilter::Kind(EventKind::SensorReading));
    run_ticks(&registry, 100);

    let mut values = Vec::new();
    while let Some(Event::SensorReading(reading)) = sub.try_recv() {
        values.push(reading.value.as_f64().unwrap());
    }
    assert_eq!(values.len(), 100);

    for value in &values {
        assert!((-40.0..=85.0).contains(value));
    }
    for pair in values.windows(2) {
        assert!(
            (pair[1] - pair[0]).abs() <= 0.5 + 1e-9,
            "consecutive readings drifted {} > max_drift",
            (pair[1] - pair[0]).abs()
        );
    }
}

#[test]
fn test_battery_non_increasing_until_offline() {
    let (bus, registry) = setup();
    let mut config = SensorConfig::new();
    // 50%/virtual-second: dead after 2 seconds.
    config.set("battery_drain", 50.0);
    registry
        .register(Sensor::with_id(
            "temp_1",
            SensorType::Temperature,
            "temp_1",
            location(),
            config,
        ))
        .unwrap();

    let mut sub = bus.subscribe();
    let mut prev_battery = 100.0;
    let mut vt = Utc::now();
    for _ in 0..5 {
        vt += ChronoDuration::seconds(1);
        registry.on_tick(&tick_at(vt, 1.0));
        let battery = registry.get("temp_1").unwrap().battery_level;
        assert!(battery <= prev_battery);
        assert!(battery >= 0.0);
        prev_battery = battery;
    }

    let sensor = registry.get("temp_1").unwrap();
    assert_eq!(sensor.battery_level, 0.0);
    assert_eq!(sensor.status, SensorStatus::Offline);

    // One reading (first tick, battery 50%), then Offline cut production.
    let mut readings = 0;
    let mut saw_offline_transition = false;
    while let Some(event) = sub.try_recv() {
        match event {
            Event::SensorReading(_) => readings += 1,
            Event::StatusChanged(change) => {
                assert_eq!(change.to, "offline");
                saw_offline_transition = true;
            }
            _ => {}
        }
    }
    assert_eq!(readings, 1);
    assert!(saw_offline_transition);

    // No further readings once Offline.
    let before = registry.get("temp_1").unwrap().last_reading;
    run_ticks(&registry, 10);
    assert_eq!(registry.get("temp_1").unwrap().last_reading, before);
}

#[test]
fn test_low_battery_warning_emitted_once() {
    let (bus, registry) = setup();
    let mut config = SensorConfig::new();
    config.set("battery_drain", 18.0); // 10% threshold reached on tick 5
    registry
        .register(Sensor::with_id(
            "temp_1",
            SensorType::Temperature,
            "temp_1",
            location(),
            config,
        ))
        .unwrap();

    let mut sub = bus.subscribe_filtered(EventFilter::Kind(EventKind::LogEmitted));
    run_ticks(&registry, 5);

    let mut warnings = 0;
    while let Some(Event::LogEmitted(entry)) = sub.try_recv() {
        assert_eq!(entry.source, "temp_1");
        assert!(entry.message.contains("battery low"));
        warnings += 1;
    }
    assert_eq!(warnings, 1);
}

#[test]
fn test_inactive_sensor_produces_no_readings() {
    let (bus, registry) = setup();
    registry.register(make_sensor("motion_1", SensorType::Motion)).unwrap();
    registry.set_active("motion_1", false).unwrap();

    let mut sub = bus.subscribe_filtered(EventFilter::Kind(EventKind::SensorReading));
    run_ticks(&registry, 20);
    assert!(sub.try_recv().is_none());

    // Battery does not drain while inactive.
    assert_eq!(registry.get("motion_1").unwrap().battery_level, 100.0);
}

#[test]
fn test_per_sensor_readings_strictly_ordered_by_virtual_time() {
    let (bus, registry) = setup();
    registry.register(make_sensor("temp_1", SensorType::Temperature)).unwrap();

    let mut sub = bus.subscribe_filtered(EventFilter::Source("temp_1".to_string()));
    run_ticks(&registry, 50);

    let mut prev: Option<chrono::DateTime<Utc>> = None;
    while let Some(Event::SensorReading(reading)) = sub.try_recv() {
        if let Some(prev_vt) = prev {
            assert!(reading.virtual_time > prev_vt);
        }
        prev = Some(reading.virtual_time);
    }
    assert!(prev.is_some());
}

#[test]
fn test_smoke_alarm_latches_until_cleared() {
    let (bus, registry) = setup();
    let mut config = SensorConfig::new();
    config.set("alarm_probability", 1.0); // force trigger on first tick
    registry
        .register(Sensor::with_id(
            "smoke_1",
            SensorType::Smoke,
            "smoke_1",
            location(),
            config.clone(),
        ))
        .unwrap();

    let mut alerts = bus.subscribe_filtered(EventFilter::Kind(EventKind::SecurityAlert));
    run_ticks(&registry, 3);

    // Alarm reading stays true while latched.
    let sensor = registry.get("smoke_1").unwrap();
    assert_eq!(sensor.last_reading.unwrap().value.as_bool(), Some(true));

    // Latching raises exactly one alert even under sustained trigger.
    let mut alert_count = 0;
    while alerts.try_recv().is_some() {
        alert_count += 1;
    }
    assert_eq!(alert_count, 1);

    // Clearing unlatches; with probability forced back to 0 the reading drops.
    registry.clear_alarm("smoke_1").unwrap();
    let mut sensor = registry.get("smoke_1").unwrap();
    sensor.config.set("alarm_probability", 0.0);
    registry.remove("smoke_1").unwrap();
    registry.register(sensor).unwrap();
    run_ticks(&registry, 1);
    assert_eq!(
        registry.get("smoke_1").unwrap().last_reading.unwrap().value.as_bool(),
        Some(false)
    );
}

#[test]
fn test_motion_latches_for_timeout() {
    let (_bus, registry) = setup();
    let mut config = SensorConfig::new();
    config.set("trigger_probability", 1.0);
    config.set("timeout_secs", 5.0);
    registry
        .register(Sensor::with_id(
            "motion_1",
            SensorType::Motion,
            "motion_1",
            location(),
            config,
        ))
        .unwrap();

    let vt = run_ticks(&registry, 1);
    assert_eq!(
        registry.get("motion_1").unwrap().last_reading.unwrap().value.as_bool(),
        Some(true)
    );

    // Flip the trigger off and advance past the timeout: motion clears.
    let mut sensor = registry.get("motion_1").unwrap();
    sensor.config.set("trigger_probability", 0.0);
    registry.remove("motion_1").unwrap();
    registry.register(sensor).unwrap();
    registry.on_tick(&tick_at(vt + ChronoDuration::seconds(10), 10.0));
    assert_eq!(
        registry.get("motion_1").unwrap().last_reading.unwrap().value.as_bool(),
        Some(false)
    );
}

#[test]
fn test_recharge_brings_offline_sensor_back() {
    let (bus, registry) = setup();
    let mut config = SensorConfig::new();
    config.set("battery_drain", 200.0);
    registry
        .register(Sensor::with_id(
            "temp_1",
            SensorType::Temperature,
            "temp_1",
            location(),
            config,
        ))
        .unwrap();

    run_ticks(&registry, 1);
    assert_eq!(registry.get("temp_1").unwrap().status, SensorStatus::Offline);

    let mut sub = bus.subscribe_filtered(EventFilter::Kind(EventKind::StatusChanged));
    registry.recharge("temp_1").unwrap();

    let sensor = registry.get("temp_1").unwrap();
    assert_eq!(sensor.status, SensorStatus::Online);
    assert_eq!(sensor.battery_level, 100.0);

    match sub.try_recv() {
        Some(Event::StatusChanged(change)) => {
            assert_eq!(change.from, "offline");
            assert_eq!(change.to, "online");
        }
        other => panic!("expected StatusChanged, got {:?}", other),
    }
}

#[test]
fn test_reset_restores_all_sensors() {
    let (_bus, registry) = setup();
    let mut config = SensorConfig::new();
    config.set("battery_drain", 200.0);
    registry
        .register(Sensor::with_id(
            "temp_1",
            SensorType::Temperature,
            "temp_1",
            location(),
            config,
        ))
        .unwrap();
    run_ticks(&registry, 1);
    assert_eq!(registry.get("temp_1").unwrap().status, SensorStatus::Offline);

    registry.reset();

    let sensor = registry.get("temp_1").unwrap();
    assert_eq!(sensor.status, SensorStatus::Online);
    assert_eq!(sensor.battery_level, 100.0);
    assert!(sensor.last_reading.is_none());
}

#[test]
fn test_type_defaults_merged_under_overrides() {
    let mut config = SensorConfig::new();
    config.set("accuracy", 0.1);
    let sensor = Sensor::new(SensorType::Temperature, "t", location(), config);

    assert_eq!(sensor.config.get_f64("accuracy", 0.0), 0.1); // override
    assert_eq!(sensor.config.get_f64("max_value", 0.0), 85.0); // type default
    assert_eq!(sensor.config.get_str("unit", ""), "celsius");
}
