/// Identity Service Main Entry Point
///
/// Consumes the identity queue from Kafka. Builds without the `kafka`
/// feature have no transport of their own; the gateway embeds the service
/// on its in-process bus instead.
use std::sync::Arc;

use access_control::JwtCredentialVerifier;
use anyhow::{Context, Result};
use identity_service::{config::Settings, consumer, UserDirectory};
use tracing::info;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,identity_service=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true),
        )
        .init();

    info!("Starting Identity Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    let verifier = JwtCredentialVerifier::from_rsa_pem(
        &settings.jwt.public_key_pem,
        &settings.jwt.validation(),
    )
    .context("Invalid JWT_PUBLIC_KEY_PEM")?;
    info!(issuer = ?settings.jwt.issuer, "JWT verification configured (RS256)");

    let consumer = consumer(Arc::new(verifier), UserDirectory::new());
    serve(&settings, consumer).await
}

#[cfg(feature = "kafka")]
async fn serve(
    settings: &Settings,
    consumer: jwt_propagation::InboundCredentialLayer<message_queue::Router>,
) -> Result<()> {
    use message_queue::kafka::{KafkaConfig, KafkaServer};

    anyhow::ensure!(
        !settings.queue.kafka_brokers.is_empty(),
        "KAFKA_BROKERS must be set"
    );

    let config = KafkaConfig {
        brokers: settings.queue.kafka_brokers.join(","),
        group_id: settings.service_name.clone(),
        request_timeout: settings.queue.rpc_timeout,
    };
    let server = KafkaServer::new(&config, &settings.queue.identity_queue, Arc::new(consumer))
        .context("Failed to start Kafka consumer")?;

    info!(queue = %settings.queue.identity_queue, "Identity queue consumer running");
    server.run().await.context("Kafka consumer stopped")
}

#[cfg(not(feature = "kafka"))]
async fn serve(
    _settings: &Settings,
    _consumer: jwt_propagation::InboundCredentialLayer<message_queue::Router>,
) -> Result<()> {
    anyhow::bail!(
        "identity-service was built without the `kafka` feature; \
         run it embedded in graphql-gateway or rebuild with --features kafka"
    )
}
