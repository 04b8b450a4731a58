use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod bus;

pub use bus::{EventBus, Subscription};

use crate::sensors::{ReadingValue, SensorType};

/// Severity of a [`LogEntry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Best-effort severity-tag detection. Unrecognized tags fall back to INFO.
    pub fn parse_tag(tag: &str) -> LogLevel {
        match tag.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => LogLevel::Debug,
            "WARNING" | "WARN" => LogLevel::Warning,
            "ERROR" | "FATAL" | "CRITICAL" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured log entry produced by a LogMonitor.
///
/// Immutable once created; ownership moves from the monitor to the bus to
/// whichever store keeps it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Component id the entry originated from.
    pub source: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(source: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            message: message.into(),
        }
    }
}

/// One virtual-time advancement step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub virtual_time: DateTime<Utc>,
    /// Virtual seconds elapsed since the previous tick.
    pub delta_secs: f64,
}

/// A reading produced by a sensor model for one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub value: ReadingValue,
    pub virtual_time: DateTime<Utc>,
}

/// A sensor or component moved to a new lifecycle status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub source_id: String,
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
}

/// An automation rule fired. The rule framework itself lives outside the
/// engine; this is the event shape it publishes through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleTrigger {
    pub rule_id: String,
    pub description: String,
    pub context: Value,
    pub timestamp: DateTime<Utc>,
}

/// Security-relevant condition (latched smoke alarm, tamper detection).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityAlert {
    pub source_id: String,
    pub severity: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Tagged union carried by the [`EventBus`].
///
/// Events are values; once published they are never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Tick(Tick),
    SensorReading(SensorReading),
    StatusChanged(StatusChange),
    LogEmitted(LogEntry),
    RuleTriggered(RuleTrigger),
    SecurityAlert(SecurityAlert),
}

/// Discriminant of an [`Event`], used for subscription filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Tick,
    SensorReading,
    StatusChanged,
    LogEmitted,
    RuleTriggered,
    SecurityAlert,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::SensorReading(_) => EventKind::SensorReading,
            Event::StatusChanged(_) => EventKind::StatusChanged,
            Event::LogEmitted(_) => EventKind::LogEmitted,
            Event::RuleTriggered(_) => EventKind::RuleTriggered,
            Event::SecurityAlert(_) => EventKind::SecurityAlert,
        }
    }

    /// Timestamp carried by the payload (virtual time for simulation events).
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Tick(t) => t.virtual_time,
            Event::SensorReading(r) => r.virtual_time,
            Event::StatusChanged(s) => s.timestamp,
            Event::LogEmitted(l) => l.timestamp,
            Event::RuleTriggered(r) => r.timestamp,
            Event::SecurityAlert(a) => a.timestamp,
        }
    }

    /// Id of the sensor or component the event concerns, when it has one.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            Event::Tick(_) => None,
            Event::SensorReading(r) => Some(&r.sensor_id),
            Event::StatusChanged(s) => Some(&s.source_id),
            Event::LogEmitted(l) => Some(&l.source),
            Event::RuleTriggered(r) => Some(&r.rule_id),
            Event::SecurityAlert(a) => Some(&a.source_id),
        }
    }
}

/// Subscription filter evaluated against every published event.
#[derive(Clone, Debug)]
pub enum EventFilter {
    /// Only events of one kind.
    Kind(EventKind),
    /// Events of any of the listed kinds.
    Kinds(Vec<EventKind>),
    /// Only events concerning a specific sensor/component id.
    Source(String),
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventFilter::Kind(kind) => event.kind() == *kind,
            EventFilter::Kinds(kinds) => kinds.contains(&event.kind()),
            EventFilter::Source(id) => event.source_id() == Some(id.as_str()),
        }
    }
}
