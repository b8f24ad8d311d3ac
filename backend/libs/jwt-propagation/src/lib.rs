//! Bearer credential propagation across queue-connected services
//!
//! A request authenticated at the edge keeps its caller's identity on every
//! hop behind it: the credential travels in the message envelope's
//! `Authorization` header and is re-read on the receiving side.
//!
//! ## Core Components
//!
//! - **ForwardingClient**: wraps a queue transport and attaches the current
//!   request's credential to outgoing messages
//! - **InboundCredentialLayer**: wraps a message handler, opens one request
//!   scope per message and resolves the forwarded identity for the guards
//! - **EnvelopeCredentialExt**: read/write the credential on an envelope
//!
//! ## Trust model
//!
//! The edge verifies credentials (signature, expiry). Services behind the
//! queue only decode the forwarded credential; they trust the internal
//! producer to have verified it. Messages must therefore never be accepted
//! from outside the internal network.
//!
//! ## Usage
//!
//! ### Sending side (gateway)
//!
//! ```rust,ignore
//! // `RequestScope` has captured the inbound credential for this request.
//! let identity = ForwardingClient::new(bus.client("identity"));
//! let account: AccountInfo = identity.send("accountInfo", &()).await?;
//! ```
//!
//! ### Receiving side (backend service)
//!
//! ```rust,ignore
//! let layer = InboundCredentialLayer::new(router, verifier, factory);
//! bus.bind("identity", Arc::new(layer));
//! ```

mod client;
mod extensions;
mod server;

use error_types::RpcError;
use message_queue::QueueError;
use thiserror::Error;

pub use client::{forward_credential, ForwardingClient};
pub use extensions::EnvelopeCredentialExt;
pub use server::InboundCredentialLayer;

/// Failure of a forwarded call
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode reply: {0}")]
    Decode(#[source] serde_json::Error),

    /// The remote handler answered with an error
    #[error("Remote call failed: {0}")]
    Remote(RpcError),

    #[error("Transport error: {0}")]
    Transport(QueueError),
}

impl From<QueueError> for ForwardError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Remote(remote) => ForwardError::Remote(remote),
            other => ForwardError::Transport(other),
        }
    }
}

impl ForwardError {
    pub fn remote(&self) -> Option<&RpcError> {
        match self {
            ForwardError::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status a gateway should answer with
    ///
    /// Remote errors keep their own status; a timeout is 504 and any other
    /// transport failure 502.
    pub fn status_code(&self) -> u16 {
        match self {
            ForwardError::Remote(err) => err.status,
            ForwardError::Transport(QueueError::Timeout(_)) => 504,
            ForwardError::Transport(_) => 502,
            ForwardError::Encode(_) | ForwardError::Decode(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_remote_error_is_unwrapped() {
        let remote = RpcError::new("FORBIDDEN", 403, "Forbidden");
        let err = ForwardError::from(QueueError::Remote(remote.clone()));
        assert_eq!(err.remote(), Some(&remote));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_transport_status() {
        let timeout = ForwardError::from(QueueError::Timeout(Duration::from_secs(5)));
        assert_eq!(timeout.status_code(), 504);
        let missing = ForwardError::from(QueueError::NoConsumer("identity".into()));
        assert_eq!(missing.status_code(), 502);
    }
}
