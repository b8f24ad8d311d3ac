use std::env;

use access_control::JwtCredentialVerifier;
use anyhow::{Context, Result};
use crypto_core::ValidationSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub jwt: JwtConfig,
    pub queue: QueueConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub public_key_pem: String,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
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

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub notification_queue: String,
    pub kafka_brokers: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            app: AppConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "notification-service".to_string()),
            },
            jwt: JwtConfig {
                public_key_pem: env::var("JWT_PUBLIC_KEY_PEM")
                    .context("JWT_PUBLIC_KEY_PEM must be set")?,
                issuer: env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
                audience: split_list(&env::var("JWT_AUDIENCE").unwrap_or_default()),
            },
            queue: QueueConfig {
                notification_queue: env::var("NOTIFICATION_QUEUE")
                    .unwrap_or_else(|_| "notifications".to_string()),
                kafka_brokers: split_list(&env::var("KAFKA_BROKERS").unwrap_or_default()),
            },
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("JWT_PUBLIC_KEY_PEM", crypto_core::test_utils::TEST_PUBLIC_KEY);
        env::set_var("NOTIFICATION_QUEUE", "mail");
        env::remove_var("KAFKA_BROKERS");

        let config = Config::from_env().unwrap();
        assert_eq!(config.queue.notification_queue, "mail");
        assert!(config.queue.kafka_brokers.is_empty());
        assert!(config.jwt.verifier().is_ok());

        env::remove_var("JWT_PUBLIC_KEY_PEM");
        env::remove_var("NOTIFICATION_QUEUE");
    }

    #[test]
    #[serial]
    fn test_garbage_key_is_rejected() {
        let jwt = JwtConfig {
            public_key_pem: "not a key".to_string(),
            issuer: None,
            audience: Vec::new(),
        };
        assert!(jwt.verifier().is_err());
    }
}
