/// Queue event handlers
///
/// Events arrive with the credential of the user whose request emitted them.
/// The worker authorizes that user again before delivering anything.
use std::sync::Arc;

use access_control::{
    Action, AuthGuard, ExecutionContext, PolicyHandler, RequestGuard, RouteMetadata, Subject,
};
use error_types::{AuthError, RpcError};
use message_queue::{handler_fn, MessageEnvelope, Router};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::abilities::NOTIFICATION_SUBJECT;
use crate::error::{NotificationError, Result};
use crate::models::{patterns, Delivery, NotificationEvent};
use crate::services::Mailbox;

#[derive(Clone)]
pub struct NotificationHandlers {
    guard: Arc<AuthGuard>,
    mailbox: Arc<dyn Mailbox>,
}

impl NotificationHandlers {
    pub fn new(guard: Arc<AuthGuard>, mailbox: Arc<dyn Mailbox>) -> Self {
        Self { guard, mailbox }
    }

    pub async fn send_notification(&self, envelope: MessageEnvelope) -> Result<()> {
        let route = RouteMetadata::new().policy(PolicyHandler::can(Action::Create, NOTIFICATION_SUBJECT));
        let check = self.guard.check(ExecutionContext::Rpc(&envelope), &route);
        let authorized = check.await?;

        let (identity, ability) = match (authorized.identity(), authorized.ability()) {
            (Some(identity), Some(ability)) => (identity, ability),
            _ => return Err(AuthError::Unauthenticated("no identity on event".to_string()).into()),
        };

        let event: NotificationEvent = envelope.payload()?;
        if event.title.trim().is_empty() {
            return Err(NotificationError::InvalidEvent("title must not be empty".to_string()));
        }

        let target = json!({ "recipientId": event.recipient_id });
        if ability.cannot(Action::Create, Subject::instance(NOTIFICATION_SUBJECT, &target)) {
            warn!(
                sender_id = %identity.subject_id(),
                recipient_id = %event.recipient_id,
                "Notification to another user rejected"
            );
            return Err(AuthError::Forbidden(format!(
                "{} may not notify {}",
                identity.subject_id(),
                event.recipient_id
            ))
            .into());
        }

        debug!(notification_id = %event.id, sender_id = %identity.subject_id(), "Delivering notification");
        self.mailbox
            .deliver(Delivery {
                event,
                sender_id: identity.subject_id().to_string(),
            })
            .await
    }

    pub fn router(self) -> Router {
        let handlers = Arc::new(self);

        Router::new().route(
            patterns::SEND_NOTIFICATION,
            handler_fn(move |envelope: MessageEnvelope| {
                let handlers = Arc::clone(&handlers);
                async move {
                    handlers
                        .send_notification(envelope)
                        .await
                        .map(|()| Value::Null)
                        .map_err(RpcError::from)
                }
            }),
        )
    }
}
