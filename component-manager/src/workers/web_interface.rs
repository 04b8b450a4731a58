//! Simulated web dashboard server.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::component::ComponentType;

use super::{Worker, WorkerContext};

const PAGES: [&str; 4] = ["/", "/dashboard", "/sensors", "/components"];

pub struct WebInterfaceWorker;

#[async_trait]
impl Worker for WebInterfaceWorker {
    fn kind(&self) -> ComponentType {
        ComponentType::WebInterface
    }

    async fn run(&self, mut ctx: WorkerContext) -> anyhow::Result<()> {
        let port = ctx
            .config
            .port
            .unwrap_or_else(|| ComponentType::WebInterface.default_port());
        let interval = Duration::from_millis(ctx.config.option_u64("heartbeat_ms", 5000));

        ctx.emit(
            "INFO",
            format!("Serving dashboard on http://{}:{}", ctx.config.host, port),
        )
        .await;
        if !ctx.startup_delay().await {
            return Ok(());
        }
        ctx.signal_ready();

        while ctx.idle(interval).await {
            let (page, cost_ms, slow) = {
                let mut rng = rand::thread_rng();
                (
                    PAGES[rng.gen_range(0..PAGES.len())],
                    rng.gen_range(1..250),
                    rng.gen_bool(0.05),
                )
            };
            ctx.emit("INFO", format!("GET {page} - 200 ({cost_ms}ms)")).await;
            if slow {
                ctx.emit("WARNING", format!("Slow render for {page}: {cost_ms}ms"))
                    .await;
            }
        }

        ctx.emit("INFO", "Web interface shutting down").await;
        Ok(())
    }
}
