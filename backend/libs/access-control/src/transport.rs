//! Transport adapter
//!
//! Normalizes the three inbound shapes into a [`RequestHandle`] plus the raw
//! credential:
//!
//! | Transport | Handle source | Credential |
//! |-----------|---------------|------------|
//! | HTTP      | request extensions (cached) | `Authorization` header |
//! | GraphQL   | execution context data | same, via the HTTP handle |
//! | RPC       | `rpcRequest` scope key, else synthesized from the envelope | envelope `Authorization` header, decoded without verification |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use actix_web::{HttpMessage, HttpRequest};
use error_types::AuthError;
use message_queue::MessageEnvelope;
use request_context::RequestContext;
use tracing::debug;

use crate::context::RPC_REQUEST;
use crate::factory::AbilityFactory;
use crate::handle::RequestHandle;
use crate::identity::Credential;
use crate::verifier::CredentialVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    GraphQl,
    Rpc,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::GraphQl => "graphql",
            TransportKind::Rpc => "rpc",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(TransportKind::Http),
            "graphql" => Ok(TransportKind::GraphQl),
            "rpc" => Ok(TransportKind::Rpc),
            other => Err(AuthError::UnsupportedTransport(other.to_string())),
        }
    }
}

/// Access to the request handle a GraphQL execution context carries
///
/// GraphQL contexts wrap the HTTP request rather than being one; the gateway
/// attaches the HTTP request's handle to the operation's data.
pub trait GraphQlContext {
    fn request_handle(&self) -> Option<RequestHandle>;
}

/// What a guard is invoked with
#[derive(Clone, Copy)]
pub enum ExecutionContext<'a> {
    Http(&'a HttpRequest),
    GraphQl(&'a (dyn GraphQlContext + Sync + 'a)),
    Rpc(&'a MessageEnvelope),
}

impl ExecutionContext<'_> {
    pub fn kind(&self) -> TransportKind {
        match self {
            ExecutionContext::Http(_) => TransportKind::Http,
            ExecutionContext::GraphQl(_) => TransportKind::GraphQl,
            ExecutionContext::Rpc(_) => TransportKind::Rpc,
        }
    }
}

/// Result of the extract step
#[derive(Debug, Clone)]
pub struct Extraction {
    pub handle: RequestHandle,
    pub credential: Option<Credential>,
}

/// Handle for an HTTP request, created on first use and cached in extensions
pub fn http_request_handle(req: &HttpRequest) -> RequestHandle {
    let cached = req.extensions().get::<RequestHandle>().cloned();
    if let Some(handle) = cached {
        return handle;
    }

    let headers = req.headers().iter().filter_map(|(name, value)| {
        value
            .to_str()
            .ok()
            .map(|value| (name.as_str().to_string(), value.to_string()))
    });
    let credential = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credential::from_authorization_header);

    let handle = RequestHandle::new(TransportKind::Http, headers, credential);
    req.extensions_mut().insert(handle.clone());
    handle
}

/// Synthetic handle for a queue message
///
/// The credential is decoded without verification and the identity attached
/// up front. A header that does not decode counts as no credential.
pub fn rpc_request_handle(envelope: &MessageEnvelope, verifier: &dyn CredentialVerifier) -> RequestHandle {
    let decoded = envelope
        .authorization()
        .and_then(Credential::from_authorization_header)
        .and_then(|credential| verifier.decode(&credential).map(|identity| (credential, identity)));

    let headers = envelope
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.clone()));

    match decoded {
        Some((credential, identity)) => {
            let handle = RequestHandle::new(TransportKind::Rpc, headers, Some(credential));
            handle.attach_identity(identity);
            handle
        }
        None => {
            if envelope.authorization().is_some() {
                debug!(pattern = %envelope.pattern, "Envelope credential did not decode; treating as absent");
            }
            RequestHandle::new(TransportKind::Rpc, headers, None)
        }
    }
}

/// Build the RPC request handle for `envelope`, compute its ability, and
/// store it under [`RPC_REQUEST`] in the current scope
///
/// Runs once per inbound message, before any guard. Returns the factory's
/// error unchanged.
pub async fn synthesize_rpc_request(
    envelope: &MessageEnvelope,
    verifier: &dyn CredentialVerifier,
    factory: &dyn AbilityFactory,
) -> anyhow::Result<RequestHandle> {
    let handle = rpc_request_handle(envelope, verifier);
    if let Some(identity) = handle.identity() {
        handle.ability_or_init(factory, &identity).await?;
    }
    RequestContext::set(&RPC_REQUEST, handle.clone());
    Ok(handle)
}

/// Extracts `{ handle, credential }` from any execution context
#[derive(Clone)]
pub struct TransportAdapter {
    verifier: Arc<dyn CredentialVerifier>,
}

impl TransportAdapter {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &Arc<dyn CredentialVerifier> {
        &self.verifier
    }

    pub fn extract(&self, ctx: ExecutionContext<'_>) -> Result<Extraction, AuthError> {
        let handle = match ctx {
            ExecutionContext::Http(req) => http_request_handle(req),
            ExecutionContext::GraphQl(gql) => gql.request_handle().ok_or_else(|| {
                AuthError::UnsupportedTransport(
                    "GraphQL context carries no request handle".to_string(),
                )
            })?,
            ExecutionContext::Rpc(envelope) => match RequestContext::get(&RPC_REQUEST) {
                Some(handle) => handle,
                None => {
                    // Outside the inbound layer: build once and keep it, so
                    // stacked guards share one ability
                    let handle = rpc_request_handle(envelope, self.verifier.as_ref());
                    if !RequestContext::set(&RPC_REQUEST, handle.clone()) {
                        debug!(pattern = %envelope.pattern, "No request scope; RPC handle is not shared");
                    }
                    handle
                }
            },
        };

        let credential = handle.credential().cloned();
        Ok(Extraction { handle, credential })
    }
}
