//! Permission rules checked at the edge
//!
//! These mirror the rules of the services behind the gateway closely enough
//! to reject obviously unauthorized calls before they are forwarded; the
//! services still decide for themselves.

use access_control::{Action, RoleAbilityFactory, SUBJECT_ID_PLACEHOLDER};
use serde_json::json;

pub const USER_SUBJECT: &str = "User";
pub const NOTIFICATION_SUBJECT: &str = "Notification";

pub fn gateway_abilities() -> RoleAbilityFactory {
    RoleAbilityFactory::new()
        .authenticated(|rules| {
            rules
                .can_where(Action::Read, USER_SUBJECT, json!({ "id": SUBJECT_ID_PLACEHOLDER }))
                .can_where(Action::Update, USER_SUBJECT, json!({ "id": SUBJECT_ID_PLACEHOLDER }))
                .can_where(
                    Action::Create,
                    NOTIFICATION_SUBJECT,
                    json!({ "recipientId": SUBJECT_ID_PLACEHOLDER }),
                )
        })
        .role("Support", |rules| rules.can(Action::Read, USER_SUBJECT))
        .role("Admin", |rules| {
            rules
                .can(Action::Manage, USER_SUBJECT)
                .can(Action::Manage, NOTIFICATION_SUBJECT)
        })
}
