//! Request and reply payloads of the identity queue

use access_control::Rule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue patterns served by the identity service
pub mod patterns {
    pub const ACCOUNT_INFO: &str = "accountInfo";
    pub const ABILITY_RULES: &str = "abilityRules";
    pub const FIND_USER: &str = "findUser";
}

/// Rules of the caller's ability, as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityRules {
    /// `true` for the superuser ability (a single `manage all` rule)
    pub unrestricted: bool,
    pub rules: Vec<Rule>,
}

/// The calling user's own account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub roles: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub ability: AbilityRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindUserRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub roles: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
