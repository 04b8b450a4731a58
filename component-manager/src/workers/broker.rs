//! Simulated MQTT broker.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::component::ComponentType;

use super::{Worker, WorkerContext};

const TOPICS: [&str; 3] = ["sensors/temp/data", "sensors/motion/data", "system/status"];

pub struct MqttBrokerWorker;

#[async_trait]
impl Worker for MqttBrokerWorker {
    fn kind(&self) -> ComponentType {
        ComponentType::MqttBroker
    }

    async fn run(&self, mut ctx: WorkerContext) -> anyhow::Result<()> {
        let port = ctx
            .config
            .port
            .unwrap_or_else(|| ComponentType::MqttBroker.default_port());
        let interval = Duration::from_millis(ctx.config.option_u64("heartbeat_ms", 4000));
        let max_clients = ctx.config.option_u64("max_clients", 100).max(1);

        ctx.emit("INFO", format!("MQTT broker starting on port {port}")).await;
        if !ctx.startup_delay().await {
            return Ok(());
        }
        ctx.emit("INFO", format!("Listening on {}:{}", ctx.config.host, port))
            .await;
        ctx.signal_ready();

        while ctx.idle(interval).await {
            let (op, client, topic, clients) = {
                let mut rng = rand::thread_rng();
                (
                    rng.gen_range(0..5),
                    rng.gen_range(1000..10000),
                    TOPICS[rng.gen_range(0..TOPICS.len())],
                    rng.gen_range(0..max_clients),
                )
            };
            match op {
                0 => ctx.emit("INFO", format!("Client connected: client_{client}")).await,
                1 => ctx.emit("INFO", format!("Message published to {topic}")).await,
                2 => {
                    ctx.emit("DEBUG", format!("Active clients: {clients}/{max_clients}"))
                        .await
                }
                3 => ctx.emit("INFO", format!("Subscription to {topic}")).await,
                _ => ctx.emit("WARNING", "High message volume detected").await,
            }
        }

        ctx.emit("INFO", "MQTT broker shutting down").await;
        Ok(())
    }
}
