//! Permission rules of the identity service
//!
//! | Role | Rules |
//! |------|-------|
//! | any authenticated | read, update own `User` |
//! | `Support` | read any `User` |
//! | `Admin` | manage any `User` |
//! | `Super` | everything |

use access_control::{Action, RoleAbilityFactory, SUBJECT_ID_PLACEHOLDER};
use serde_json::json;

pub const USER_SUBJECT: &str = "User";

pub fn identity_abilities() -> RoleAbilityFactory {
    RoleAbilityFactory::new()
        .authenticated(|rules| {
            rules
                .can_where(Action::Read, USER_SUBJECT, json!({ "id": SUBJECT_ID_PLACEHOLDER }))
                .can_where(Action::Update, USER_SUBJECT, json!({ "id": SUBJECT_ID_PLACEHOLDER }))
        })
        .role("Support", |rules| rules.can(Action::Read, USER_SUBJECT))
        .role("Admin", |rules| rules.can(Action::Manage, USER_SUBJECT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_control::{Identity, Subject};

    #[test]
    fn test_own_record_only() {
        let ability = identity_abilities().build_for(&Identity::new("u1", Vec::<String>::new()));
        let own = json!({ "id": "u1" });
        let other = json!({ "id": "u2" });

        assert!(ability.can(Action::Read, Subject::instance(USER_SUBJECT, &own)));
        assert!(ability.can(Action::Update, Subject::instance(USER_SUBJECT, &own)));
        assert!(ability.cannot(Action::Read, Subject::instance(USER_SUBJECT, &other)));
        assert!(ability.cannot(Action::Delete, Subject::instance(USER_SUBJECT, &own)));
    }

    #[test]
    fn test_support_reads_everyone() {
        let ability = identity_abilities().build_for(&Identity::new("s1", ["Support"]));
        let other = json!({ "id": "u2" });
        assert!(ability.can(Action::Read, Subject::instance(USER_SUBJECT, &other)));
        assert!(ability.cannot(Action::Update, Subject::instance(USER_SUBJECT, &other)));
    }

    #[test]
    fn test_admin_manages_users() {
        let ability = identity_abilities().build_for(&Identity::new("a1", ["Admin"]));
        assert!(ability.can(Action::Delete, USER_SUBJECT));
    }
}
