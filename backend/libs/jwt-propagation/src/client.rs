//! Client-side credential forwarding
//!
//! Attaches the credential of the request currently being served to every
//! outgoing queue message.

use access_control::current_credential;
use async_trait::async_trait;
use message_queue::{
    MessageEnvelope, MessageTransport, Pattern, QueueError, AUTHORIZATION_HEADER,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::extensions::EnvelopeCredentialExt;
use crate::ForwardError;

/// Queue client that forwards the caller's credential
///
/// Wraps any [`MessageTransport`]. Before a message leaves, the raw
/// credential captured for the current request scope is attached as
/// `Authorization: Bearer <token>`, unchanged. The forwarded credential is
/// the original caller's, never one representing this service.
///
/// ## Rules
///
/// - No credential in scope (anonymous route, background job): no header
/// - Envelope already carries `Authorization`: left untouched
/// - The credential is read when the call is made, so the client itself can
///   be shared freely between requests
///
/// ## Usage
///
/// ```rust,ignore
/// let identity = ForwardingClient::new(bus.client("identity"));
///
/// // Inside an HTTP handler, under `RequestScope`:
/// let account: AccountInfo = identity.send("accountInfo", &()).await?;
/// identity.emit("notification.send", &event).await?;
/// ```
#[derive(Clone)]
pub struct ForwardingClient<T> {
    transport: T,
}

impl<T: MessageTransport> ForwardingClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn inner(&self) -> &T {
        &self.transport
    }

    /// Typed request/reply
    pub async fn send<Req, Res>(&self, cmd: &str, request: &Req) -> Result<Res, ForwardError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let data = serde_json::to_value(request).map_err(ForwardError::Encode)?;
        let reply = self
            .request(MessageEnvelope::new(Pattern::cmd(cmd), data))
            .await?;
        serde_json::from_value(reply).map_err(ForwardError::Decode)
    }

    /// Fire-and-forget event
    ///
    /// Not retracted if the originating request is later aborted.
    pub async fn emit<E>(&self, cmd: &str, event: &E) -> Result<(), ForwardError>
    where
        E: Serialize + ?Sized,
    {
        let data = serde_json::to_value(event).map_err(ForwardError::Encode)?;
        self.publish(MessageEnvelope::new(Pattern::cmd(cmd), data))
            .await?;
        Ok(())
    }
}

/// Add the scope's credential to `envelope` unless it already has one
pub fn forward_credential(envelope: MessageEnvelope) -> MessageEnvelope {
    if envelope.has_header(AUTHORIZATION_HEADER) {
        return envelope;
    }

    match current_credential() {
        Some(credential) => envelope.attach_credential(&credential),
        None => {
            debug!(pattern = %envelope.pattern, "No credential in scope; sending without Authorization");
            envelope
        }
    }
}

#[async_trait]
impl<T: MessageTransport> MessageTransport for ForwardingClient<T> {
    async fn request(&self, envelope: MessageEnvelope) -> Result<Value, QueueError> {
        self.transport.request(forward_credential(envelope)).await
    }

    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), QueueError> {
        self.transport.publish(forward_credential(envelope)).await
    }
}
