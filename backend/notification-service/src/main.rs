use std::sync::Arc;

use anyhow::{Context, Result};
use notification_service::{consumer, Config, LoggingMailbox};
use tracing::info;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notification_service=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(service = %config.app.service_name, "Starting notification worker");

    let verifier = config.jwt.verifier()?;
    let consumer = consumer(Arc::new(verifier), Arc::new(LoggingMailbox));
    run(&config, consumer).await
}

#[cfg(feature = "kafka")]
async fn run(
    config: &Config,
    consumer: jwt_propagation::InboundCredentialLayer<message_queue::Router>,
) -> Result<()> {
    use message_queue::kafka::{KafkaConfig, KafkaServer};

    anyhow::ensure!(!config.queue.kafka_brokers.is_empty(), "KAFKA_BROKERS must be set");

    let kafka = KafkaConfig {
        brokers: config.queue.kafka_brokers.join(","),
        group_id: config.app.service_name.clone(),
        ..KafkaConfig::default()
    };
    let server = KafkaServer::new(&kafka, &config.queue.notification_queue, Arc::new(consumer))
        .context("Failed to start Kafka consumer")?;

    info!(queue = %config.queue.notification_queue, "Notification queue consumer running");
    server.run().await.context("Kafka consumer stopped")
}

#[cfg(not(feature = "kafka"))]
async fn run(
    _config: &Config,
    _consumer: jwt_propagation::InboundCredentialLayer<message_queue::Router>,
) -> Result<()> {
    anyhow::bail!(
        "notification-service was built without the `kafka` feature; \
         run it embedded in graphql-gateway or rebuild with --features kafka"
    )
}
