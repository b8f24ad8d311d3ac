use std::fmt;
use std::sync::Arc;

use crypto_core::{strip_bearer, Claims, BEARER_PREFIX};
use serde::{Deserialize, Serialize};

/// Role that bypasses every role and policy check
pub const SUPERUSER_ROLE: &str = "Super";

/// Authenticated subject and its role claims
///
/// Only built from a verified (or, on the internal queue path, decoded)
/// credential. Roles keep claim order with duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject_id: String,
    roles: Vec<String>,
}

impl Identity {
    pub fn new<I, S>(subject_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        Self {
            subject_id: subject_id.into(),
            roles: unique,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sub.clone(), claims.roles.iter().cloned())
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_superuser(&self) -> bool {
        self.has_role(SUPERUSER_ROLE)
    }
}

/// Bearer token, stored without the `Bearer ` scheme
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// `None` for an empty token
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        (!token.is_empty()).then(|| Self(Arc::from(token)))
    }

    /// Parse an `Authorization` header value; `None` unless it is `Bearer <token>`
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        strip_bearer(value).and_then(Self::new)
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Wire form, `Bearer <token>`
    pub fn to_header_value(&self) -> String {
        format!("{BEARER_PREFIX}{}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}
