//! Component lifecycle orchestration.
//!
//! The manager owns the component table and drives every status transition.
//! Each running component is three tasks: the worker body, a supervisor that
//! waits on the worker and flags unexpected exits, and a LogMonitor draining
//! the worker's output. The manager holds the only handles to all three and
//! releases them exactly once per run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

use hearth::error::HearthError;
use hearth::event::{Event, EventBus, LogEntry, LogLevel, StatusChange};

use crate::component::{
    ComponentDefinition, ComponentState, ComponentStatus, SharedState, StatusInfo,
};
use crate::config::ManagerConfig;
use crate::monitor::LogMonitor;
use crate::workers::{worker_for, Worker, WorkerContext};

/// Task handles and signals for one running component.
struct ComponentRuntime {
    shutdown_tx: watch::Sender<bool>,
    monitor_stop_tx: watch::Sender<bool>,
    worker_abort: AbortHandle,
    supervisor: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

impl ComponentRuntime {
    /// Force-terminate the worker and join both helper tasks. Safe to call
    /// on an already-dead runtime; every handle resolves at most once.
    async fn force_teardown(self) {
        let _ = self.shutdown_tx.send(true);
        self.worker_abort.abort();
        let _ = self.supervisor.await;
        let _ = self.monitor_stop_tx.send(true);
        let _ = self.monitor.await;
    }
}

struct ManagedComponent {
    definition: ComponentDefinition,
    state: SharedState,
    worker: Arc<dyn Worker>,
    runtime: Option<ComponentRuntime>,
}

pub struct ComponentManager {
    config: ManagerConfig,
    bus: Arc<EventBus>,
    components: Mutex<HashMap<String, ManagedComponent>>,
}

impl ComponentManager {
    pub fn new(config: ManagerConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            components: Mutex::new(HashMap::new()),
        }
    }

    /// Register a component with the default worker for its type.
    pub async fn register(&self, definition: ComponentDefinition) -> Result<(), HearthError> {
        let worker = worker_for(definition.component_type);
        self.register_with_worker(definition, worker).await
    }

    /// Register a component with an explicit worker implementation. The
    /// worker must be of the component's declared type.
    pub async fn register_with_worker(
        &self,
        definition: ComponentDefinition,
        worker: Arc<dyn Worker>,
    ) -> Result<(), HearthError> {
        if worker.kind() != definition.component_type {
            return Err(HearthError::InvalidConfig(format!(
                "worker type {} does not match component type {} for {}",
                worker.kind(),
                definition.component_type,
                definition.id
            )));
        }
        let mut components = self.components.lock().await;
        if components.contains_key(&definition.id) {
            return Err(HearthError::DuplicateId(definition.id));
        }
        info!(component_id = %definition.id, component_type = %definition.component_type, "Registered component");
        let state = ComponentState::new(self.config.log_buffer_capacity);
        components.insert(
            definition.id.clone(),
            ManagedComponent {
                definition,
                state,
                worker,
                runtime: None,
            },
        );
        Ok(())
    }

    /// Start a component. Legal from `Stopped` and `Error`; a leftover worker
    /// from a crashed run is force-terminated before the new launch.
    pub async fn start(&self, id: &str) -> Result<(), HearthError> {
        // Gate and transition under the table lock so concurrent starts
        // cannot both pass.
        let (definition, state, worker, stale_runtime) = {
            let mut components = self.components.lock().await;
            let managed = components
                .get_mut(id)
                .ok_or_else(|| HearthError::NotFound(id.to_string()))?;
            let mut st = managed.state.lock().await;
            if !ComponentStatus::can_transition(st.status, ComponentStatus::Starting) {
                return Err(HearthError::AlreadyRunning(id.to_string()));
            }
            let from = st.status;
            st.status = ComponentStatus::Starting;
            drop(st);
            self.publish_status(id, from, ComponentStatus::Starting);
            (
                managed.definition.clone(),
                managed.state.clone(),
                managed.worker.clone(),
                managed.runtime.take(),
            )
        };

        if let Some(runtime) = stale_runtime {
            runtime.force_teardown().await;
        }

        info!(component_id = %id, "Starting {}", definition.name);

        if let Err(err) = worker.prelaunch(&definition.config).await {
            let detail = format!("Failed to start {}: {err:#}", definition.name);
            self.fail_start(id, &state, &detail).await;
            return Err(HearthError::LaunchFailure(detail));
        }

        let (line_tx, line_rx) = mpsc::channel(self.config.line_channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (monitor_stop_tx, monitor_stop_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel();

        let monitor = LogMonitor::spawn(
            id.to_string(),
            line_rx,
            state.clone(),
            self.bus.clone(),
            shutdown_rx.clone(),
            monitor_stop_rx,
        );

        let ctx = WorkerContext::new(
            id.to_string(),
            definition.component_type,
            definition.config.clone(),
            line_tx,
            shutdown_rx,
            ready_tx,
        );
        let worker_task = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(ctx).await })
        };
        let worker_abort = worker_task.abort_handle();
        let supervisor = tokio::spawn(Self::supervise(
            id.to_string(),
            worker_task,
            state.clone(),
            self.bus.clone(),
        ));

        let runtime = ComponentRuntime {
            shutdown_tx,
            monitor_stop_tx,
            worker_abort,
            supervisor,
            monitor,
        };

        // First health signal, bounded by the configured timeout.
        let health_timeout = Duration::from_millis(self.config.health_check_timeout_ms);
        match tokio::time::timeout(health_timeout, ready_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // The worker dropped its ready channel: it exited during
                // startup.
                let detail = format!("{} exited during startup", definition.name);
                self.fail_start(id, &state, &detail).await;
                runtime.force_teardown().await;
                return Err(HearthError::LaunchFailure(detail));
            }
            Err(_) => {
                let detail = format!(
                    "{} did not report healthy within {}ms",
                    definition.name, self.config.health_check_timeout_ms
                );
                self.fail_start(id, &state, &detail).await;
                runtime.force_teardown().await;
                return Err(HearthError::HealthCheckTimeout(id.to_string()));
            }
        }

        // Install the handles before the component becomes stoppable, so a
        // stop racing this start can never miss them.
        {
            let mut components = self.components.lock().await;
            if let Some(managed) = components.get_mut(id) {
                managed.runtime = Some(runtime);
            }
        }
        {
            let mut st = state.lock().await;
            st.status = ComponentStatus::Running;
            st.started_at = Some(Utc::now());
        }
        self.publish_status(id, ComponentStatus::Starting, ComponentStatus::Running);
        info!(component_id = %id, "{} started successfully", definition.name);
        Ok(())
    }

    /// Stop a component. `Running` goes through `Stopping` to `Stopped`,
    /// terminating the worker after the grace period if it does not exit on
    /// its own, and always joins the monitor before returning. Stopping an
    /// already-stopped component succeeds without effect; a component in
    /// `Error` keeps that status (recovery goes through `start`/`restart`)
    /// but any worker still alive from the failed run is terminated.
    pub async fn stop(&self, id: &str) -> Result<(), HearthError> {
        let (name, state, runtime) = {
            let mut components = self.components.lock().await;
            let managed = components
                .get_mut(id)
                .ok_or_else(|| HearthError::NotFound(id.to_string()))?;
            let mut st = managed.state.lock().await;
            match st.status {
                ComponentStatus::Stopped => return Ok(()),
                ComponentStatus::Error => {
                    drop(st);
                    let runtime = managed.runtime.take();
                    if let Some(runtime) = runtime {
                        runtime.force_teardown().await;
                    }
                    return Ok(());
                }
                ComponentStatus::Running => {}
                ComponentStatus::Starting | ComponentStatus::Stopping => {
                    return Err(HearthError::NotRunning(id.to_string()));
                }
            }
            st.status = ComponentStatus::Stopping;
            drop(st);
            self.publish_status(id, ComponentStatus::Running, ComponentStatus::Stopping);
            (
                managed.definition.name.clone(),
                managed.state.clone(),
                managed.runtime.take(),
            )
        };

        info!(component_id = %id, "Stopping {name}");

        if let Some(runtime) = runtime {
            let _ = runtime.shutdown_tx.send(true);
            let grace = Duration::from_millis(self.config.stop_grace_ms);
            let mut supervisor = runtime.supervisor;
            if tokio::time::timeout(grace, &mut supervisor).await.is_err() {
                warn!(component_id = %id, "{name} did not stop within {}ms, terminating", self.config.stop_grace_ms);
                runtime.worker_abort.abort();
                let _ = supervisor.await;
            }
            let _ = runtime.monitor_stop_tx.send(true);
            let _ = runtime.monitor.await;
        }

        {
            let mut st = state.lock().await;
            st.status = ComponentStatus::Stopped;
            st.started_at = None;
        }
        self.publish_status(id, ComponentStatus::Stopping, ComponentStatus::Stopped);
        info!(component_id = %id, "{name} stopped");
        Ok(())
    }

    /// Restart a component: implicit stop-then-start. From `Error` the stop
    /// is the force-termination of any leftover worker inside `start`.
    pub async fn restart(&self, id: &str) -> Result<(), HearthError> {
        let status = self.current_status(id).await?;
        match status {
            ComponentStatus::Running => {
                self.stop(id).await?;
            }
            ComponentStatus::Stopped | ComponentStatus::Error => {}
            ComponentStatus::Starting | ComponentStatus::Stopping => {
                return Err(HearthError::AlreadyRunning(id.to_string()));
            }
        }
        self.start(id).await
    }

    /// Status snapshot for one component.
    pub async fn status(&self, id: &str) -> Result<StatusInfo, HearthError> {
        let components = self.components.lock().await;
        let managed = components
            .get(id)
            .ok_or_else(|| HearthError::NotFound(id.to_string()))?;
        Ok(Self::snapshot(managed).await)
    }

    /// Status snapshots for all components, ordered by id.
    pub async fn all_status(&self) -> Vec<StatusInfo> {
        let components = self.components.lock().await;
        let mut out = Vec::with_capacity(components.len());
        for managed in components.values() {
            out.push(Self::snapshot(managed).await);
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Most recent `limit` log entries for one component, oldest first.
    pub async fn component_logs(&self, id: &str, limit: usize) -> Result<Vec<LogEntry>, HearthError> {
        let components = self.components.lock().await;
        let managed = components
            .get(id)
            .ok_or_else(|| HearthError::NotFound(id.to_string()))?;
        let logs = managed.state.lock().await.recent_logs(limit);
        Ok(logs)
    }

    /// Most recent `limit` entries across all components, merged by timestamp.
    pub async fn all_logs(&self, limit: usize) -> Vec<LogEntry> {
        let components = self.components.lock().await;
        let mut entries = Vec::new();
        for managed in components.values() {
            entries.extend(managed.state.lock().await.recent_logs(usize::MAX));
        }
        entries.sort_by_key(|e| e.timestamp);
        let skip = entries.len().saturating_sub(limit);
        entries.split_off(skip)
    }

    /// Start every stopped component. Failures are logged and do not halt
    /// the sweep.
    pub async fn start_all(&self) {
        for id in self.component_ids().await {
            if let Ok(ComponentStatus::Stopped) = self.current_status(&id).await {
                if let Err(err) = self.start(&id).await {
                    error!(component_id = %id, "Failed to start component: {err}");
                }
            }
        }
    }

    /// Stop every running component and clean up any failed ones.
    pub async fn stop_all(&self) {
        for id in self.component_ids().await {
            if let Err(err) = self.stop(&id).await {
                error!(component_id = %id, "Failed to stop component: {err}");
            }
        }
    }

    /// Manager teardown: stop everything.
    pub async fn shutdown(&self) {
        info!("Shutting down component manager");
        self.stop_all().await;
    }

    async fn component_ids(&self) -> Vec<String> {
        let components = self.components.lock().await;
        let mut ids: Vec<String> = components.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn current_status(&self, id: &str) -> Result<ComponentStatus, HearthError> {
        let components = self.components.lock().await;
        let managed = components
            .get(id)
            .ok_or_else(|| HearthError::NotFound(id.to_string()))?;
        let st = managed.state.lock().await;
        Ok(st.status)
    }

    async fn snapshot(managed: &ManagedComponent) -> StatusInfo {
        let st = managed.state.lock().await;
        let uptime_secs = match (st.status, st.started_at) {
            (ComponentStatus::Running, Some(started)) => {
                Some((Utc::now() - started).num_seconds())
            }
            _ => None,
        };
        StatusInfo {
            id: managed.definition.id.clone(),
            name: managed.definition.name.clone(),
            component_type: managed.definition.component_type,
            status: st.status,
            port: managed
                .definition
                .config
                .port
                .or(Some(managed.definition.component_type.default_port())),
            uptime_secs,
        }
    }

    /// Record a failed launch. Skipped if the supervisor already moved the
    /// component to `Error` with its own details.
    async fn fail_start(&self, id: &str, state: &SharedState, detail: &str) {
        let mut st = state.lock().await;
        if st.status != ComponentStatus::Starting {
            return;
        }
        st.status = ComponentStatus::Error;
        let entry = LogEntry::new(id, LogLevel::Error, detail);
        st.push_log(entry.clone());
        drop(st);
        self.bus.publish(Event::LogEmitted(entry));
        self.publish_status(id, ComponentStatus::Starting, ComponentStatus::Error);
        error!(component_id = %id, "{detail}");
    }

    fn publish_status(&self, id: &str, from: ComponentStatus, to: ComponentStatus) {
        self.bus.publish(Event::StatusChanged(StatusChange {
            source_id: id.to_string(),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
            timestamp: Utc::now(),
        }));
    }

    /// Waits on the worker task and flags exits the manager did not ask for.
    async fn supervise(
        id: String,
        worker_task: JoinHandle<anyhow::Result<()>>,
        state: SharedState,
        bus: Arc<EventBus>,
    ) {
        let outcome = worker_task.await;
        let mut st = state.lock().await;
        match st.status {
            // Expected during stop or after a health-check failure.
            ComponentStatus::Stopping | ComponentStatus::Stopped | ComponentStatus::Error => return,
            // An exit while Starting is surfaced through the dropped ready
            // channel; only flag crashes out of Running here.
            ComponentStatus::Starting => return,
            ComponentStatus::Running => {}
        }

        let detail = match outcome {
            Ok(Ok(())) => "Worker exited unexpectedly".to_string(),
            Ok(Err(err)) => format!("Worker failed: {err:#}"),
            Err(_) => "Worker task aborted".to_string(),
        };
        st.status = ComponentStatus::Error;
        st.started_at = None;
        let entry = LogEntry::new(id.clone(), LogLevel::Error, detail.clone());
        st.push_log(entry.clone());
        drop(st);
        bus.publish(Event::LogEmitted(entry));
        bus.publish(Event::StatusChanged(StatusChange {
            source_id: id.clone(),
            from: ComponentStatus::Running.as_str().to_string(),
            to: ComponentStatus::Error.as_str().to_string(),
            timestamp: Utc::now(),
        }));
        warn!(component_id = %id, "{detail}");
    }
}

#[cfg(test)]
mod tests;
