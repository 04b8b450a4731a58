use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use hearth::error::HearthError;
use hearth::event::{Event, EventBus, EventFilter, EventKind, LogLevel};

use crate::component::{ComponentConfig, ComponentDefinition, ComponentStatus, ComponentType};
use crate::config::ManagerConfig;
use crate::workers::{Worker, WorkerContext};

use super::ComponentManager;

fn test_config() -> ManagerConfig {
    ManagerConfig {
        health_check_timeout_ms: 500,
        stop_grace_ms: 200,
        log_buffer_capacity: 100,
        line_channel_capacity: 64,
        components: Vec::new(),
    }
}

fn definition(id: &str, component_type: ComponentType) -> ComponentDefinition {
    let mut options = HashMap::new();
    options.insert("heartbeat_ms".to_string(), json!(10));
    ComponentDefinition {
        id: id.to_string(),
        name: format!("Test {id}"),
        component_type,
        config: ComponentConfig {
            options,
            ..ComponentConfig::default()
        },
    }
}

fn manager(bus: &Arc<EventBus>) -> ComponentManager {
    ComponentManager::new(test_config(), bus.clone())
}

/// Reports healthy, then exits on its own after `run_for`.
struct CrashingWorker {
    run_for: Duration,
}

#[async_trait]
impl Worker for CrashingWorker {
    fn kind(&self) -> ComponentType {
        ComponentType::ApiServer
    }

    async fn run(&self, mut ctx: WorkerContext) -> anyhow::Result<()> {
        ctx.emit("INFO", "starting up").await;
        ctx.signal_ready();
        tokio::time::sleep(self.run_for).await;
        ctx.emit("ERROR", "fatal fault").await;
        Ok(())
    }
}

#[tokio::test]
async fn test_start_reaches_running_with_status_sequence() {
    let bus = Arc::new(EventBus::new(256));
    let mut statuses = bus.subscribe_filtered(EventFilter::Kind(EventKind::StatusChanged));
    let manager = manager(&bus);

    manager
        .register(definition("db", ComponentType::DatabaseServer))
        .await
        .unwrap();
    manager.start("db").await.unwrap();

    let info = manager.status("db").await.unwrap();
    assert_eq!(info.status, ComponentStatus::Running);
    assert_eq!(info.port, Some(5432));

    let mut seen = Vec::new();
    while let Some(Event::StatusChanged(change)) = statuses.try_recv() {
        seen.push((change.from, change.to));
    }
    assert_eq!(
        seen,
        vec![
            ("stopped".to_string(), "starting".to_string()),
            ("starting".to_string(), "running".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_running_component_emits_info_logs() {
    let bus = Arc::new(EventBus::new(256));
    let manager = manager(&bus);
    manager
        .register(definition("db", ComponentType::DatabaseServer))
        .await
        .unwrap();
    manager.start("db").await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let logs = manager.component_logs("db", 100).await.unwrap();
    assert!(logs.iter().any(|e| e.level == LogLevel::Info));
    assert!(logs.iter().all(|e| e.source == "db"));
    manager.stop("db").await.unwrap();
}

#[tokio::test]
async fn test_start_unknown_component() {
    let bus = Arc::new(EventBus::new(16));
    let manager = manager(&bus);
    assert_eq!(
        manager.start("ghost").await,
        Err(HearthError::NotFound("ghost".to_string()))
    );
}

#[tokio::test]
async fn test_worker_type_mismatch_rejected() {
    let bus = Arc::new(EventBus::new(16));
    let manager = manager(&bus);
    // CrashingWorker reports itself as an API server.
    let result = manager
        .register_with_worker(
            definition("db", ComponentType::DatabaseServer),
            Arc::new(CrashingWorker {
                run_for: Duration::from_millis(10),
            }),
        )
        .await;
    assert!(matches!(result, Err(HearthError::InvalidConfig(_))));
    assert!(matches!(
        manager.status("db").await,
        Err(HearthError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let bus = Arc::new(EventBus::new(16));
    let manager = manager(&bus);
    manager
        .register(definition("api", ComponentType::ApiServer))
        .await
        .unwrap();
    assert_eq!(
        manager
            .register(definition("api", ComponentType::ApiServer))
            .await,
        Err(HearthError::DuplicateId("api".to_string()))
    );
}

#[tokio::test]
async fn test_start_while_running_rejected() {
    let bus = Arc::new(EventBus::new(64));
    let manager = manager(&bus);
    manager
        .register(definition("api", ComponentType::ApiServer))
        .await
        .unwrap();
    manager.start("api").await.unwrap();
    assert_eq!(
        manager.start("api").await,
        Err(HearthError::AlreadyRunning("api".to_string()))
    );
    manager.stop("api").await.unwrap();
}

#[tokio::test]
async fn test_stop_stopped_component_is_noop() {
    let bus = Arc::new(EventBus::new(16));
    let mut statuses = bus.subscribe_filtered(EventFilter::Kind(EventKind::StatusChanged));
    let manager = manager(&bus);
    manager
        .register(definition("api", ComponentType::ApiServer))
        .await
        .unwrap();

    assert_eq!(manager.stop("api").await, Ok(()));
    let info = manager.status("api").await.unwrap();
    assert_eq!(info.status, ComponentStatus::Stopped);
    assert!(statuses.try_recv().is_none());
}

#[tokio::test]
async fn test_prelaunch_failure_moves_to_error() {
    let bus = Arc::new(EventBus::new(64));
    let manager = manager(&bus);
    let mut def = definition("db", ComponentType::DatabaseServer);
    def.config
        .options
        .insert("backend".to_string(), json!("oracle"));
    manager.register(def).await.unwrap();

    let result = manager.start("db").await;
    assert!(matches!(result, Err(HearthError::LaunchFailure(_))));

    let info = manager.status("db").await.unwrap();
    assert_eq!(info.status, ComponentStatus::Error);

    let logs = manager.component_logs("db", 10).await.unwrap();
    assert!(logs.iter().any(|e| e.level == LogLevel::Error));
}

#[tokio::test]
async fn test_health_check_timeout_moves_to_error() {
    let bus = Arc::new(EventBus::new(64));
    let manager = ComponentManager::new(
        ManagerConfig {
            health_check_timeout_ms: 50,
            ..test_config()
        },
        bus.clone(),
    );
    let mut def = definition("api", ComponentType::ApiServer);
    def.config
        .options
        .insert("startup_delay_ms".to_string(), json!(10_000));
    manager.register(def).await.unwrap();

    assert_eq!(
        manager.start("api").await,
        Err(HearthError::HealthCheckTimeout("api".to_string()))
    );
    let info = manager.status("api").await.unwrap();
    assert_eq!(info.status, ComponentStatus::Error);
}

#[tokio::test]
async fn test_worker_crash_flags_error() {
    let bus = Arc::new(EventBus::new(128));
    let mut statuses = bus.subscribe_filtered(EventFilter::Kind(EventKind::StatusChanged));
    let manager = manager(&bus);
    manager
        .register_with_worker(
            definition("api", ComponentType::ApiServer),
            Arc::new(CrashingWorker {
                run_for: Duration::from_millis(20),
            }),
        )
        .await
        .unwrap();
    manager.start("api").await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    let info = manager.status("api").await.unwrap();
    assert_eq!(info.status, ComponentStatus::Error);

    let mut saw_crash_transition = false;
    while let Some(Event::StatusChanged(change)) = statuses.try_recv() {
        if change.from == "running" && change.to == "error" {
            saw_crash_transition = true;
        }
    }
    assert!(saw_crash_transition);

    let logs = manager.component_logs("api", 100).await.unwrap();
    assert!(logs
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message.contains("exited unexpectedly")));
}

#[tokio::test]
async fn test_restart_from_error_recovers() {
    let bus = Arc::new(EventBus::new(128));
    let manager = manager(&bus);
    manager
        .register_with_worker(
            definition("api", ComponentType::ApiServer),
            Arc::new(CrashingWorker {
                run_for: Duration::from_millis(10),
            }),
        )
        .await
        .unwrap();
    manager.start("api").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        manager.status("api").await.unwrap().status,
        ComponentStatus::Error
    );

    manager.restart("api").await.unwrap();
    assert_eq!(
        manager.status("api").await.unwrap().status,
        ComponentStatus::Running
    );
    manager.stop("api").await.unwrap();
}

#[tokio::test]
async fn test_stop_leaves_no_running_tasks() {
    let bus = Arc::new(EventBus::new(256));
    let manager = manager(&bus);
    manager
        .register(definition("mq", ComponentType::MqttBroker))
        .await
        .unwrap();
    manager.start("mq").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.stop("mq").await.unwrap();

    assert_eq!(
        manager.status("mq").await.unwrap().status,
        ComponentStatus::Stopped
    );

    // Any surviving worker or monitor would keep appending entries.
    let before = manager.component_logs("mq", 1000).await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after = manager.component_logs("mq", 1000).await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_all_status_sorted_by_id() {
    let bus = Arc::new(EventBus::new(16));
    let manager = manager(&bus);
    manager
        .register(definition("web", ComponentType::WebInterface))
        .await
        .unwrap();
    manager
        .register(definition("api", ComponentType::ApiServer))
        .await
        .unwrap();
    manager
        .register(definition("db", ComponentType::DatabaseServer))
        .await
        .unwrap();

    let statuses = manager.all_status().await;
    let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["api", "db", "web"]);
    assert!(statuses
        .iter()
        .all(|s| s.status == ComponentStatus::Stopped && s.uptime_secs.is_none()));
}

#[tokio::test]
async fn test_start_all_and_stop_all() {
    let bus = Arc::new(EventBus::new(512));
    let manager = manager(&bus);
    manager
        .register(definition("api", ComponentType::ApiServer))
        .await
        .unwrap();
    manager
        .register(definition("db", ComponentType::DatabaseServer))
        .await
        .unwrap();

    manager.start_all().await;
    for status in manager.all_status().await {
        assert_eq!(status.status, ComponentStatus::Running);
    }

    manager.stop_all().await;
    for status in manager.all_status().await {
        assert_eq!(status.status, ComponentStatus::Stopped);
    }
}
