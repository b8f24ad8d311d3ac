use std::sync::Arc;

use access_control::{CredentialVerifier, RequestScope};
use actix_web::{middleware::Logger, App, HttpServer};
use graphql_gateway::{clients::ServiceClients, config::Config, configure, AppState};
use tracing::info;
use tracing_subscriber::prelude::*;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured JSON logs with span context
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,graphql_gateway=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    info!("Starting GraphQL Gateway...");

    let config = Config::from_env()?;
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(config.jwt.verifier()?);
    info!("JWT authentication enabled with RS256 algorithm");

    let clients = service_clients(&config, Arc::clone(&verifier))?;
    let state = AppState::new(clients, verifier, config.graphql.introspection);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!(address = %bind_address, "GraphQL Gateway listening");

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(RequestScope)
            .wrap(Logger::default())
            .configure(|cfg| configure(cfg, &state))
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(not(feature = "kafka"))]
fn service_clients(
    config: &Config,
    verifier: Arc<dyn CredentialVerifier>,
) -> anyhow::Result<ServiceClients> {
    use graphql_gateway::embedded::bind_services;
    use identity_service::UserDirectory;
    use message_queue::LocalBus;
    use notification_service::LoggingMailbox;

    let bus = LocalBus::new();
    bind_services(
        &bus,
        &config.queues,
        verifier,
        UserDirectory::new(),
        Arc::new(LoggingMailbox),
    );
    Ok(ServiceClients::local(&bus, &config.queues))
}

#[cfg(feature = "kafka")]
fn service_clients(
    config: &Config,
    _verifier: Arc<dyn CredentialVerifier>,
) -> anyhow::Result<ServiceClients> {
    anyhow::ensure!(!config.queues.kafka_brokers.is_empty(), "KAFKA_BROKERS must be set");
    let clients = ServiceClients::kafka(&config.queues, "graphql-gateway")?;
    info!(brokers = ?config.queues.kafka_brokers, "Backend services reached over Kafka");
    Ok(clients)
}
