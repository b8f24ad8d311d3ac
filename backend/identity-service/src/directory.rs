//! In-memory user directory

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub roles: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Users known to this service, keyed by subject id
///
/// A user is recorded the first time one of their requests is served.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Arc<DashMap<String, UserRecord>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a user; roles are replaced with the latest claims
    pub fn record_seen(&self, id: &str, roles: &[String]) -> UserRecord {
        let now = Utc::now();
        let mut entry = self
            .users
            .entry(id.to_string())
            .or_insert_with(|| UserRecord {
                id: id.to_string(),
                roles: Vec::new(),
                first_seen_at: now,
                last_seen_at: now,
            });
        entry.roles = roles.to_vec();
        entry.last_seen_at = now;
        entry.clone()
    }

    pub fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_seen_keeps_first_seen() {
        let directory = UserDirectory::new();
        let first = directory.record_seen("u1", &["Viewer".to_string()]);
        let second = directory.record_seen("u1", &["Editor".to_string()]);

        assert_eq!(directory.len(), 1);
        assert_eq!(second.first_seen_at, first.first_seen_at);
        assert_eq!(second.roles, vec!["Editor".to_string()]);
        assert!(directory.get("u2").is_none());
    }
}
