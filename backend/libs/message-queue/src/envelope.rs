use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Header carrying the forwarded credential (`Bearer <token>`)
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Routing key of a message (`{ "cmd": "accountInfo" }` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub cmd: String,
}

impl Pattern {
    pub fn cmd(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cmd)
    }
}

/// A message as it travels over the queue
///
/// Only what is in the envelope crosses the process boundary; in particular
/// the sender's request scope does not.
#[derive(Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: Uuid,
    pub pattern: Pattern,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl MessageEnvelope {
    pub fn new(pattern: Pattern, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern,
            data,
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
            reply_to: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Header lookup: exact name first, then case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Raw `Authorization` header value, scheme included
    pub fn authorization(&self) -> Option<&str> {
        self.header(AUTHORIZATION_HEADER)
    }

    /// Deserialize the payload into a typed request
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

impl fmt::Debug for MessageEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                    (key.as_str(), "[REDACTED]")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("MessageEnvelope")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("headers", &headers)
            .field("timestamp", &self.timestamp)
            .field("reply_to", &self.reply_to)
            .finish_non_exhaustive()
    }
}
