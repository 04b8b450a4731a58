//! Worker implementations for the managed components.
//!
//! Each component type runs as a long-lived tokio task that emits raw,
//! timestamp-tagged text lines over a bounded channel, mimicking the stdout
//! of an external server process. The manager never interprets worker
//! output itself; the LogMonitor does.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::component::{ComponentConfig, ComponentType};

mod api_server;
mod broker;
mod database;
mod web_interface;

pub use api_server::ApiServerWorker;
pub use broker::MqttBrokerWorker;
pub use database::DatabaseWorker;
pub use web_interface::WebInterfaceWorker;

/// A runnable component backend.
///
/// `prelaunch` validates configuration before any task is spawned; a failure
/// there surfaces as a launch failure and the component never leaves the
/// starting state. `run` is the worker body and owns the task until shutdown
/// is signalled or it exits on its own (which the supervisor treats as a
/// crash).
#[async_trait]
pub trait Worker: Send + Sync {
    fn kind(&self) -> ComponentType;

    async fn prelaunch(&self, _config: &ComponentConfig) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, ctx: WorkerContext) -> anyhow::Result<()>;
}

/// Default worker for a component type.
pub fn worker_for(component_type: ComponentType) -> Arc<dyn Worker> {
    match component_type {
        ComponentType::ApiServer => Arc::new(ApiServerWorker),
        ComponentType::DatabaseServer => Arc::new(DatabaseWorker),
        ComponentType::MqttBroker => Arc::new(MqttBrokerWorker),
        ComponentType::WebInterface => Arc::new(WebInterfaceWorker),
    }
}

/// Everything a worker body needs: its identity, its config, the line
/// channel back to the monitor, the shutdown signal, and the one-shot
/// readiness channel the health check waits on.
pub struct WorkerContext {
    pub component_id: String,
    pub config: ComponentConfig,
    tag: &'static str,
    lines: mpsc::Sender<String>,
    shutdown: watch::Receiver<bool>,
    ready: Option<oneshot::Sender<()>>,
}

impl WorkerContext {
    pub fn new(
        component_id: String,
        component_type: ComponentType,
        config: ComponentConfig,
        lines: mpsc::Sender<String>,
        shutdown: watch::Receiver<bool>,
        ready: oneshot::Sender<()>,
    ) -> Self {
        Self {
            component_id,
            config,
            tag: component_type.log_tag(),
            lines,
            shutdown,
            ready: Some(ready),
        }
    }

    /// Emit one raw output line in the wire format the monitor parses:
    /// `[2026-08-26 10:00:00] DATABASE INFO: Query executed`.
    pub async fn emit(&self, level: &str, message: impl AsRef<str>) {
        let line = format!(
            "[{}] {} {}: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            self.tag,
            level,
            message.as_ref(),
        );
        // A closed channel means the monitor is gone and the component is
        // tearing down; the line is simply lost.
        let _ = self.lines.send(line).await;
    }

    /// Report the worker healthy. The health check in the manager resolves
    /// once this fires. Subsequent calls are no-ops.
    pub fn signal_ready(&mut self) {
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(());
        }
    }

    pub fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep for `period`, waking early on shutdown. Returns false when the
    /// worker should exit.
    pub async fn idle(&mut self, period: Duration) -> bool {
        if self.shutting_down() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(period) => true,
            res = self.shutdown.changed() => {
                // A dropped sender also means the component is going away.
                res.is_ok() && !*self.shutdown.borrow()
            }
        }
    }

    /// Simulated startup cost, driven by the `startup_delay_ms` option.
    pub async fn startup_delay(&mut self) -> bool {
        let delay = self.config.option_u64("startup_delay_ms", 0);
        if delay == 0 {
            return !self.shutting_down();
        }
        self.idle(Duration::from_millis(delay)).await
    }
}
