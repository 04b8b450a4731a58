//! Simulated database server with selectable backend.

use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use rand::Rng;

use crate::component::{ComponentConfig, ComponentType};

use super::{Worker, WorkerContext};

const SUPPORTED_BACKENDS: [&str; 2] = ["sqlite", "mongodb"];

pub struct DatabaseWorker;

#[async_trait]
impl Worker for DatabaseWorker {
    fn kind(&self) -> ComponentType {
        ComponentType::DatabaseServer
    }

    async fn prelaunch(&self, config: &ComponentConfig) -> anyhow::Result<()> {
        let backend = config.option_str("backend", "sqlite");
        if !SUPPORTED_BACKENDS.contains(&backend) {
            bail!("unsupported database backend: {backend}");
        }
        Ok(())
    }

    async fn run(&self, mut ctx: WorkerContext) -> anyhow::Result<()> {
        let backend = ctx.config.option_str("backend", "sqlite").to_string();
        let interval = Duration::from_millis(ctx.config.option_u64("heartbeat_ms", 3000));

        ctx.emit("INFO", format!("Database server starting ({backend} backend)"))
            .await;
        if !ctx.startup_delay().await {
            return Ok(());
        }
        ctx.emit("INFO", "Database initialized successfully").await;
        ctx.signal_ready();

        while ctx.idle(interval).await {
            let (op, cost_ms, active) = {
                let mut rng = rand::thread_rng();
                (rng.gen_range(0..4), rng.gen_range(1..100), rng.gen_range(0..5))
            };
            match op {
                0 => {
                    ctx.emit("INFO", format!("Query executed - SELECT readings ({cost_ms}ms)"))
                        .await
                }
                1 => {
                    ctx.emit("INFO", format!("Data inserted - sensor_data table ({cost_ms}ms)"))
                        .await
                }
                2 => {
                    ctx.emit("DEBUG", format!("Connection pool status - active: {active}/20"))
                        .await
                }
                _ => ctx.emit("INFO", "Backup operation completed successfully").await,
            }
        }

        ctx.emit("INFO", "Database server shutting down").await;
        Ok(())
    }
}
