//! Configuration management for Identity Service
//!
//! Loads settings from environment variables, with a `.env` file picked up
//! in development builds.
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("Consuming queue: {}", settings.queue.identity_queue);
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use crypto_core::ValidationSettings;
use tracing::info;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub service_name: String,
    pub jwt: JwtSettings,
    pub queue: QueueSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "identity-service".to_string()),
            jwt: JwtSettings::from_env()?,
            queue: QueueSettings::from_env()?,
        })
    }
}

/// Credential verification settings
///
/// Only the public key is needed: this service never mints tokens.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub public_key_pem: String,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
}

impl JwtSettings {
    pub fn from_env() -> Result<Self> {
        let public_key_pem = env::var("JWT_PUBLIC_KEY_PEM")
            .context("JWT_PUBLIC_KEY_PEM must be set")?;

        Ok(Self {
            public_key_pem,
            issuer: env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
            audience: parse_list(&env::var("JWT_AUDIENCE").unwrap_or_default()),
        })
    }

    pub fn validation(&self) -> ValidationSettings {
        ValidationSettings {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
        }
    }
}

/// Queue settings
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub identity_queue: String,
    /// Empty when running embedded on the in-process bus
    pub kafka_brokers: Vec<String>,
    pub rpc_timeout: Duration,
}

impl QueueSettings {
    pub fn from_env() -> Result<Self> {
        let rpc_timeout_ms: u64 = env::var("RPC_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("Invalid RPC_TIMEOUT_MS")?;

        Ok(Self {
            identity_queue: env::var("IDENTITY_QUEUE").unwrap_or_else(|_| "identity".to_string()),
            kafka_brokers: parse_list(&env::var("KAFKA_BROKERS").unwrap_or_default()),
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_jwt_settings_from_env() {
        env::set_var("JWT_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----");
        env::set_var("JWT_ISSUER", "nova");
        env::set_var("JWT_AUDIENCE", "api, web ,,mobile");

        let settings = JwtSettings::from_env().unwrap();
        assert_eq!(settings.issuer.as_deref(), Some("nova"));
        assert_eq!(settings.audience, vec!["api", "web", "mobile"]);

        env::remove_var("JWT_PUBLIC_KEY_PEM");
        env::remove_var("JWT_ISSUER");
        env::remove_var("JWT_AUDIENCE");
    }

    #[test]
    #[serial]
    fn test_missing_public_key_is_an_error() {
        env::remove_var("JWT_PUBLIC_KEY_PEM");
        assert!(JwtSettings::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_queue_defaults() {
        env::remove_var("IDENTITY_QUEUE");
        env::remove_var("KAFKA_BROKERS");
        env::remove_var("RPC_TIMEOUT_MS");

        let queue = QueueSettings::from_env().unwrap();
        assert_eq!(queue.identity_queue, "identity");
        assert!(queue.kafka_brokers.is_empty());
        assert_eq!(queue.rpc_timeout, Duration::from_secs(5));
    }
}
