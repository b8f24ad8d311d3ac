/// Mail delivery
///
/// The worker hands accepted events to a [`Mailbox`]. Rendering and the
/// transport to an actual mail provider live behind this trait.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::error::{NotificationError, Result};
use crate::models::Delivery;

#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn deliver(&self, delivery: Delivery) -> Result<()>;
}

/// Logs each delivery instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LoggingMailbox;

#[async_trait]
impl Mailbox for LoggingMailbox {
    async fn deliver(&self, delivery: Delivery) -> Result<()> {
        info!(
            notification_id = %delivery.event.id,
            recipient_id = %delivery.event.recipient_id,
            sender_id = %delivery.sender_id,
            notification_type = delivery.event.notification_type.as_str(),
            "Notification delivered"
        );
        Ok(())
    }
}

/// Keeps deliveries in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryMailbox {
    delivered: Arc<Mutex<Vec<Delivery>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Delivery> {
        self.delivered
            .lock()
            .map(|deliveries| deliveries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn deliver(&self, delivery: Delivery) -> Result<()> {
        self.delivered
            .lock()
            .map_err(|_| NotificationError::Delivery("mailbox lock poisoned".to_string()))?
            .push(delivery);
        Ok(())
    }
}
