//! Permission rules of the notification worker
//!
//! Users may notify themselves (reminders, copies of their own messages);
//! `Admin` may notify anyone.

use access_control::{Action, RoleAbilityFactory, SUBJECT_ID_PLACEHOLDER};
use serde_json::json;

pub const NOTIFICATION_SUBJECT: &str = "Notification";

pub fn notification_abilities() -> RoleAbilityFactory {
    RoleAbilityFactory::new()
        .authenticated(|rules| {
            rules.can_where(
                Action::Create,
                NOTIFICATION_SUBJECT,
                json!({ "recipientId": SUBJECT_ID_PLACEHOLDER }),
            )
        })
        .role("Admin", |rules| rules.can(Action::Manage, NOTIFICATION_SUBJECT))
}
