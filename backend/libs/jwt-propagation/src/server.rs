//! Server-side scope for inbound queue messages

use std::sync::Arc;

use access_control::{synthesize_rpc_request, AbilityFactory, AuthError, CredentialVerifier, RAW_CREDENTIAL};
use async_trait::async_trait;
use error_types::RpcError;
use message_queue::{MessageEnvelope, MessageHandler};
use request_context::{RequestContext, Seed};
use serde_json::Value;
use tracing::{debug_span, error, Instrument};

/// Opens a request scope around every inbound message
///
/// For each message this layer:
/// 1. opens a fresh request scope (messages never share one, and never
///    inherit the producer's)
/// 2. builds the message's request handle by decoding the credential
///    WITHOUT verification, computes the ability, and stores the handle
///    under `rpcRequest` for the guards
/// 3. seeds the scope with the decoded credential, so calls made while
///    handling the message forward it again; a header that did not decode
///    is dropped here and never travels further
/// 4. runs the wrapped handler
///
/// A malformed or missing credential is not an error here; guards on the
/// handler decide whether the pattern requires one. An ability factory
/// failure answers with a 500 [`RpcError`] and the handler is not run.
///
/// ## Usage
///
/// ```rust,ignore
/// let router = Router::new().route("accountInfo", handler_fn(account_info));
/// let layer = InboundCredentialLayer::new(router, verifier, factory);
/// bus.bind("identity", Arc::new(layer));
/// ```
pub struct InboundCredentialLayer<H> {
    inner: H,
    verifier: Arc<dyn CredentialVerifier>,
    factory: Arc<dyn AbilityFactory>,
}

impl<H: MessageHandler> InboundCredentialLayer<H> {
    pub fn new(
        inner: H,
        verifier: Arc<dyn CredentialVerifier>,
        factory: Arc<dyn AbilityFactory>,
    ) -> Self {
        Self {
            inner,
            verifier,
            factory,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for InboundCredentialLayer<H> {
    async fn handle(&self, envelope: MessageEnvelope) -> Result<Value, RpcError> {
        let span = debug_span!("rpc", pattern = %envelope.pattern, message_id = %envelope.id);

        RequestContext::run(Seed::new(), async move {
            let handle = synthesize_rpc_request(&envelope, self.verifier.as_ref(), self.factory.as_ref())
                .await
                .map_err(|e| {
                    error!(pattern = %envelope.pattern, error = %e, "Ability computation failed");
                    AuthError::Internal(e.to_string()).to_rpc_error()
                })?;

            // Only a credential that decoded is forwarded again
            if let Some(credential) = handle.credential() {
                RequestContext::set(&RAW_CREDENTIAL, credential.clone());
            }

            self.inner.handle(envelope).await
        })
        .instrument(span)
        .await
    }
}
