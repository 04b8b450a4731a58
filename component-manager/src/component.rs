//! Component identity, configuration, and the lifecycle status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use hearth::event::LogEntry;

/// Kind of system component managed by the [`ComponentManager`](crate::ComponentManager).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    ApiServer,
    DatabaseServer,
    MqttBroker,
    WebInterface,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::ApiServer => "api_server",
            ComponentType::DatabaseServer => "database_server",
            ComponentType::MqttBroker => "mqtt_broker",
            ComponentType::WebInterface => "web_interface",
        }
    }

    /// Tag the component's worker stamps into its raw log lines.
    pub fn log_tag(&self) -> &'static str {
        match self {
            ComponentType::ApiServer => "API_SERVER",
            ComponentType::DatabaseServer => "DATABASE",
            ComponentType::MqttBroker => "MQTT_BROKER",
            ComponentType::WebInterface => "WEB",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ComponentType::ApiServer => 8080,
            ComponentType::DatabaseServer => 5432,
            ComponentType::MqttBroker => 1883,
            ComponentType::WebInterface => 8000,
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component lifecycle status.
///
/// Transitions only along [`can_transition`](Self::can_transition); each
/// taken edge is published as a `StatusChanged` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Stopped => "stopped",
            ComponentStatus::Starting => "starting",
            ComponentStatus::Running => "running",
            ComponentStatus::Stopping => "stopping",
            ComponentStatus::Error => "error",
        }
    }

    /// Legal status-machine edges.
    pub fn can_transition(from: ComponentStatus, to: ComponentStatus) -> bool {
        use ComponentStatus::*;
        matches!(
            (from, to),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Error)
                | (Running, Stopping)
                | (Running, Error)
                | (Stopping, Stopped)
                | (Error, Starting)
        )
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host/port plus backend-specific options for one component.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Backend-specific options, accessed through a uniform map.
    #[serde(default)]
    pub options: HashMap<String, Value>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            options: HashMap::new(),
        }
    }
}

impl ComponentConfig {
    pub fn option_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.options.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn option_u64(&self, key: &str, default: u64) -> u64 {
        self.options.get(key).and_then(Value::as_u64).unwrap_or(default)
    }
}

/// Static description of a component, registered with the manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default)]
    pub config: ComponentConfig,
}

/// Mutable per-component state shared between the manager, the supervisor
/// task, and the LogMonitor.
pub struct ComponentState {
    pub status: ComponentStatus,
    pub started_at: Option<DateTime<Utc>>,
    log_buffer: VecDeque<LogEntry>,
    log_capacity: usize,
}

/// Handle to shared component state.
pub type SharedState = Arc<Mutex<ComponentState>>;

impl ComponentState {
    /// `log_capacity` has a floor of 1: the buffer must always be able to
    /// hold the entry just pushed.
    pub fn new(log_capacity: usize) -> SharedState {
        let log_capacity = log_capacity.max(1);
        Arc::new(Mutex::new(Self {
            status: ComponentStatus::Stopped,
            started_at: None,
            log_buffer: VecDeque::with_capacity(log_capacity.min(64)),
            log_capacity,
        }))
    }

    /// Append an entry, evicting the oldest when the buffer is full.
    pub fn push_log(&mut self, entry: LogEntry) {
        if self.log_buffer.len() >= self.log_capacity {
            self.log_buffer.pop_front();
        }
        self.log_buffer.push_back(entry);
    }

    /// Most recent `limit` entries, oldest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<LogEntry> {
        let skip = self.log_buffer.len().saturating_sub(limit);
        self.log_buffer.iter().skip(skip).cloned().collect()
    }

    pub fn log_count(&self) -> usize {
        self.log_buffer.len()
    }
}

/// Read-only status snapshot handed to callers.
#[derive(Clone, Debug, Serialize)]
pub struct StatusInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub status: ComponentStatus,
    pub port: Option<u16>,
    pub uptime_secs: Option<i64>,
}
