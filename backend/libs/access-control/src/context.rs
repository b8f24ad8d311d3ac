//! Request-scope keys used by the guards and the forwarder

use std::sync::Arc;

use request_context::{ContextKey, RequestContext, Seed};

use crate::ability::Ability;
use crate::handle::RequestHandle;
use crate::identity::{Credential, Identity};

/// Inbound bearer credential, read by the outbound forwarder
pub const RAW_CREDENTIAL: ContextKey<Credential> = ContextKey::new("rawCredential");

/// Handle of the HTTP / GraphQL request being served
pub const REQUEST_HANDLE: ContextKey<RequestHandle> = ContextKey::new("requestHandle");

/// Synthesized handle of the queue message being served
pub const RPC_REQUEST: ContextKey<RequestHandle> = ContextKey::new("rpcRequest");

pub const IDENTITY: ContextKey<Arc<Identity>> = ContextKey::new("identity");

pub const ABILITY: ContextKey<Arc<Ability>> = ContextKey::new("ability");

/// Seed for a scope serving `handle`
pub fn seed_for(key: &ContextKey<RequestHandle>, handle: &RequestHandle) -> Seed {
    let mut seed = Seed::new().with(key, handle.clone());
    if let Some(credential) = handle.credential() {
        seed.insert(&RAW_CREDENTIAL, credential.clone());
    }
    seed
}

pub fn current_credential() -> Option<Credential> {
    RequestContext::get(&RAW_CREDENTIAL)
}

pub fn current_identity() -> Option<Arc<Identity>> {
    RequestContext::get(&IDENTITY)
}

pub fn current_ability() -> Option<Arc<Ability>> {
    RequestContext::get(&ABILITY)
}

/// Handle of whichever request the current scope serves
pub fn current_request() -> Option<RequestHandle> {
    RequestContext::get(&REQUEST_HANDLE).or_else(|| RequestContext::get(&RPC_REQUEST))
}
