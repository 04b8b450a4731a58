//! Simulated REST API server.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::component::ComponentType;

use super::{Worker, WorkerContext};

pub struct ApiServerWorker;

#[async_trait]
impl Worker for ApiServerWorker {
    fn kind(&self) -> ComponentType {
        ComponentType::ApiServer
    }

    async fn run(&self, mut ctx: WorkerContext) -> anyhow::Result<()> {
        let port = ctx
            .config
            .port
            .unwrap_or_else(|| ComponentType::ApiServer.default_port());
        let heartbeat = Duration::from_millis(ctx.config.option_u64("heartbeat_ms", 5000));

        ctx.emit("INFO", format!("API server starting on {}:{}", ctx.config.host, port))
            .await;
        if !ctx.startup_delay().await {
            return Ok(());
        }
        ctx.emit("INFO", "API server ready to accept requests").await;
        ctx.signal_ready();

        while ctx.idle(heartbeat).await {
            let (connections, pick) = {
                let mut rng = rand::thread_rng();
                (rng.gen_range(0..10), rng.gen_range(0..5))
            };
            ctx.emit(
                "INFO",
                format!("Heartbeat - active connections: {connections}"),
            )
            .await;
            match pick {
                0 => ctx.emit("INFO", "GET /api/sensors - 200 OK").await,
                1 => ctx.emit("INFO", "POST /api/data - 201 Created").await,
                2 => ctx.emit("DEBUG", "Request queue empty").await,
                _ => {}
            }
        }

        ctx.emit("INFO", "API server shutting down").await;
        Ok(())
    }
}
