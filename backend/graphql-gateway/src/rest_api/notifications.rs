/// POST /api/v1/notifications
///
/// Emits a notification event to the worker. The event carries the
/// caller's credential, and the worker re-checks it before delivery.
use access_control::{Action, AuthError, CurrentAbility, CurrentUser, Subject};
use actix_web::{web, HttpResponse};
use notification_service::{NotificationEvent, NotificationType};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::abilities::NOTIFICATION_SUBJECT;
use crate::clients::ServiceClients;
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationBody {
    pub recipient_id: String,
    #[serde(default = "default_type")]
    pub notification_type: NotificationType,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

fn default_type() -> NotificationType {
    NotificationType::System
}

pub async fn send_notification(
    clients: web::Data<ServiceClients>,
    CurrentUser(identity): CurrentUser,
    CurrentAbility(ability): CurrentAbility,
    body: web::Json<SendNotificationBody>,
) -> Result<HttpResponse, GatewayError> {
    let body = body.into_inner();
    if body.title.trim().is_empty() {
        return Err(GatewayError::BadRequest("title must not be empty".to_string()));
    }

    let target = json!({ "recipientId": body.recipient_id });
    if ability.cannot(Action::Create, Subject::instance(NOTIFICATION_SUBJECT, &target)) {
        return Err(AuthError::Forbidden(format!(
            "{} may not notify {}",
            identity.subject_id(),
            body.recipient_id
        ))
        .into());
    }

    let event = NotificationEvent::new(
        body.recipient_id,
        body.notification_type,
        body.title,
        body.body,
    );
    clients.send_notification(&event).await?;
    info!(notification_id = %event.id, sender_id = %identity.subject_id(), "Notification queued");

    Ok(HttpResponse::Accepted().json(json!({ "id": event.id })))
}
