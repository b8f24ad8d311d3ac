use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue patterns consumed by the notification worker
pub mod patterns {
    pub const SEND_NOTIFICATION: &str = "notification.send";
}

/// Notification type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    /// User mentioned in a post/comment
    Mention,
    /// Direct message notification
    Message,
    /// System notification
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Mention => "mention",
            NotificationType::Message => "message",
            NotificationType::System => "system",
        }
    }
}

/// Event emitted by the gateway, on behalf of the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: Uuid,
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        recipient_id: impl Into<String>,
        notification_type: NotificationType,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            notification_type,
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// An event accepted for delivery, with the user who triggered it
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub event: NotificationEvent,
    pub sender_id: String,
}
