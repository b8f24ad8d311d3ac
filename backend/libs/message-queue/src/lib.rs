//! Queue messaging for Nova services
//!
//! Services talk to each other with request/reply messages and
//! fire-and-forget events, addressed by a `{ cmd }` pattern. Two transports
//! are provided:
//!
//! - [`LocalBus`]: in-process queues (single binary deployments, tests)
//! - `KafkaTransport` / `KafkaServer` behind the `kafka` feature
//!
//! Handler failures travel back as structured [`RpcError`] payloads.

use std::time::Duration;

use thiserror::Error;

pub mod envelope;
pub mod local;
pub mod transport;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use envelope::{MessageEnvelope, Pattern, AUTHORIZATION_HEADER};
pub use error_types::RpcError;
pub use local::{LocalBus, LocalClient};
pub use transport::{handler_fn, HandlerFn, MessageHandler, MessageTransport, Router};

/// Queue error types
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue closed: {0}")]
    Closed(String),

    #[error("No consumer bound to queue {0}")]
    NoConsumer(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Producer error: {0}")]
    Producer(String),

    #[error("Consumer error: {0}")]
    Consumer(String),

    /// The remote handler answered with an error
    #[error("Remote error: {0}")]
    Remote(#[from] RpcError),
}

impl QueueError {
    /// The remote error payload, if the failure came from the handler
    pub fn remote(&self) -> Option<&RpcError> {
        match self {
            QueueError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
