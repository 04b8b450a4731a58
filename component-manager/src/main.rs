use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use component_manager::component::{ComponentConfig, ComponentDefinition, ComponentType};
use component_manager::config::{load_config, ManagerConfig};
use component_manager::manager::ComponentManager;
use hearth::event::{EventBus, EventFilter, EventKind};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "component_manager=info,hearth=info".into()),
        )
        .init();

    info!("Component manager starting...");

    let config_path =
        std::env::var("HEARTH_COMPONENTS_CONFIG").unwrap_or_else(|_| "components.toml".to_string());
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!(path = %config_path, components = config.components.len(), "Configuration loaded");
            config
        }
        Err(err) => {
            warn!(path = %config_path, "Using default configuration: {err:#}");
            ManagerConfig::default()
        }
    };

    let bus = Arc::new(EventBus::new(1024));
    let manager = Arc::new(ComponentManager::new(config.clone(), bus.clone()));

    let definitions = if config.components.is_empty() {
        default_components()
    } else {
        config.components
    };
    for definition in definitions {
        manager
            .register(definition)
            .await
            .context("Failed to register component")?;
    }

    // Mirror status changes and component log lines onto our own output.
    let mut events = bus.subscribe_filtered(EventFilter::Kinds(vec![
        EventKind::StatusChanged,
        EventKind::LogEmitted,
    ]));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                hearth::event::Event::StatusChanged(change) => {
                    info!(component_id = %change.source_id, "Status: {} -> {}", change.from, change.to);
                }
                hearth::event::Event::LogEmitted(entry) => {
                    info!(component_id = %entry.source, "[{}] {}", entry.level.as_str(), entry.message);
                }
                _ => {}
            }
        }
    });

    manager.start_all().await;
    info!("All components started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    manager.shutdown().await;
    printer.abort();
    info!("Component manager stopped");

    Ok(())
}

fn default_components() -> Vec<ComponentDefinition> {
    [
        ("api_server", "API Server", ComponentType::ApiServer),
        ("database", "Database Server", ComponentType::DatabaseServer),
        ("mqtt_broker", "MQTT Broker", ComponentType::MqttBroker),
        ("web_interface", "Web Interface", ComponentType::WebInterface),
    ]
    .into_iter()
    .map(|(id, name, component_type)| ComponentDefinition {
        id: id.to_string(),
        name: name.to_string(),
        component_type,
        config: ComponentConfig::default(),
    })
    .collect()
}
