//! Configuration for GraphQL Gateway
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)

use std::env;
use std::time::Duration;

use access_control::JwtCredentialVerifier;
use anyhow::{Context, Result};
use crypto_core::ValidationSettings;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Queues of the backend services
    pub queues: QueueConfig,

    /// GraphQL configuration
    pub graphql: GraphQLConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// RS256 public key; the gateway only verifies tokens
    pub public_key_pem: String,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub identity_queue: String,
    pub notification_queue: String,
    /// Empty: backend services run embedded on the in-process bus
    pub kafka_brokers: Vec<String>,
    pub rpc_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GraphQLConfig {
    /// Enable introspection
    pub introspection: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let jwt = Self::jwt_from_env()?;
        info!(issuer = ?jwt.issuer, "Loading JWT configuration from environment variables");

        let rpc_timeout_ms: u64 = env::var("RPC_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("Invalid RPC_TIMEOUT_MS")?;

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            jwt,
            queues: QueueConfig {
                identity_queue: env::var("IDENTITY_QUEUE").unwrap_or_else(|_| "identity".to_string()),
                notification_queue: env::var("NOTIFICATION_QUEUE")
                    .unwrap_or_else(|_| "notifications".to_string()),
                kafka_brokers: split_list(&env::var("KAFKA_BROKERS").unwrap_or_default()),
                rpc_timeout: Duration::from_millis(rpc_timeout_ms),
            },
            graphql: GraphQLConfig {
                introspection: env::var("GRAPHQL_INTROSPECTION")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
            },
        })
    }

    /// Load JWT configuration from environment variables
    fn jwt_from_env() -> Result<JwtConfig> {
        let public_key_pem =
            env::var("JWT_PUBLIC_KEY_PEM").context("JWT_PUBLIC_KEY_PEM must be set")?;

        Ok(JwtConfig {
            public_key_pem,
            issuer: env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
            audience: split_list(&env::var("JWT_AUDIENCE").unwrap_or_default()),
        })
    }
}

impl JwtConfig {
    pub fn verifier(&self) -> Result<JwtCredentialVerifier> {
        let settings = ValidationSettings {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
        };
        JwtCredentialVerifier::from_rsa_pem(&self.public_key_pem, &settings)
            .context("Invalid JWT_PUBLIC_KEY_PEM")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
