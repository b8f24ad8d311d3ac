//! Notification mutations

use access_control::{
    to_graphql_error, Action, AuthError, FieldGuard, GraphQlAuthExt, PolicyHandler,
    RouteMetadata, Subject,
};
use async_graphql::{Context, Enum, InputObject, Object, Result as GraphQLResult, ID};
use notification_service::{NotificationEvent, NotificationType};
use serde_json::json;

use crate::abilities::NOTIFICATION_SUBJECT;
use crate::clients::ServiceClients;
use crate::error::GatewayError;

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Mention,
    Message,
    System,
}

impl From<NotificationKind> for NotificationType {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Mention => NotificationType::Mention,
            NotificationKind::Message => NotificationType::Message,
            NotificationKind::System => NotificationType::System,
        }
    }
}

#[derive(InputObject, Debug)]
pub struct SendNotificationInput {
    pub recipient_id: String,
    #[graphql(default_with = "NotificationKind::System")]
    pub kind: NotificationKind,
    pub title: String,
    #[graphql(default)]
    pub body: String,
}

#[derive(Default)]
pub struct NotificationMutation;

#[Object]
impl NotificationMutation {
    /// Queue a notification; returns its id
    #[graphql(guard = "FieldGuard::policies(RouteMetadata::new().policy(PolicyHandler::can(Action::Create, NOTIFICATION_SUBJECT)))")]
    async fn send_notification(
        &self,
        ctx: &Context<'_>,
        input: SendNotificationInput,
    ) -> GraphQLResult<ID> {
        if input.title.trim().is_empty() {
            return Err(GatewayError::BadRequest("title must not be empty".to_string()).to_graphql_error());
        }

        let ability = ctx
            .current_ability()
            .ok_or_else(|| to_graphql_error(&AuthError::Internal("no ability computed".to_string())))?;
        let target = json!({ "recipientId": input.recipient_id });
        if ability.cannot(Action::Create, Subject::instance(NOTIFICATION_SUBJECT, &target)) {
            return Err(to_graphql_error(&AuthError::Forbidden(format!(
                "may not notify {}",
                input.recipient_id
            ))));
        }

        let event = NotificationEvent::new(input.recipient_id, input.kind.into(), input.title, input.body);
        ctx.data::<ServiceClients>()?
            .send_notification(&event)
            .await
            .map_err(|e| GatewayError::from(e).to_graphql_error())?;

        Ok(ID(event.id.to_string()))
    }
}
