//! Queue clients for the backend services
//!
//! Every call goes through a [`ForwardingClient`], so it carries the
//! credential of the HTTP request being served. Calls made outside a request
//! scope go out without one and are rejected by the services.

use std::sync::Arc;

use identity_service::models::{
    patterns as identity, AbilityRules, AccountInfo, FindUserRequest, UserView,
};
use jwt_propagation::{ForwardError, ForwardingClient};
use message_queue::{LocalBus, MessageTransport};
use notification_service::models::patterns as notifications;
use notification_service::NotificationEvent;

use crate::config::QueueConfig;

pub type Transport = Arc<dyn MessageTransport>;

#[derive(Clone)]
pub struct ServiceClients {
    identity: ForwardingClient<Transport>,
    notifications: ForwardingClient<Transport>,
}

impl ServiceClients {
    pub fn new(identity: Transport, notifications: Transport) -> Self {
        Self {
            identity: ForwardingClient::new(identity),
            notifications: ForwardingClient::new(notifications),
        }
    }

    /// Clients for services consuming `bus`
    pub fn local(bus: &LocalBus, queues: &QueueConfig) -> Self {
        Self::new(
            Arc::new(bus.client(&queues.identity_queue).with_timeout(queues.rpc_timeout)),
            Arc::new(bus.client(&queues.notification_queue)),
        )
    }

    /// Clients for services consuming Kafka topics
    #[cfg(feature = "kafka")]
    pub fn kafka(
        queues: &QueueConfig,
        group_id: &str,
    ) -> Result<Self, message_queue::QueueError> {
        use message_queue::kafka::{KafkaConfig, KafkaTransport};

        let config = KafkaConfig {
            brokers: queues.kafka_brokers.join(","),
            group_id: group_id.to_string(),
            request_timeout: queues.rpc_timeout,
        };
        let identity = KafkaTransport::connect(
            &config,
            &queues.identity_queue,
            &format!("{}.replies.{group_id}", queues.identity_queue),
        )?;
        let notifications = KafkaTransport::connect(
            &config,
            &queues.notification_queue,
            &format!("{}.replies.{group_id}", queues.notification_queue),
        )?;

        Ok(Self::new(Arc::new(identity), Arc::new(notifications)))
    }

    pub async fn account_info(&self) -> Result<AccountInfo, ForwardError> {
        self.identity.send(identity::ACCOUNT_INFO, &()).await
    }

    pub async fn ability_rules(&self) -> Result<AbilityRules, ForwardError> {
        self.identity.send(identity::ABILITY_RULES, &()).await
    }

    pub async fn find_user(&self, id: &str) -> Result<UserView, ForwardError> {
        let request = FindUserRequest { id: id.to_string() };
        self.identity.send(identity::FIND_USER, &request).await
    }

    pub async fn send_notification(&self, event: &NotificationEvent) -> Result<(), ForwardError> {
        self.notifications
            .emit(notifications::SEND_NOTIFICATION, event)
            .await
    }
}
