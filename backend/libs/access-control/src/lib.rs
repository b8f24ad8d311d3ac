//! Transport-agnostic authorization for Nova services
//!
//! One guard pipeline serves REST (actix-web), GraphQL (async-graphql) and
//! queue RPC messages:
//!
//! 1. the transport adapter extracts a [`RequestHandle`] and the bearer
//!    credential from whatever context the guard was invoked with
//! 2. the credential is verified (or, on the internal queue path, decoded)
//!    into an [`Identity`]
//! 3. the service's [`AbilityFactory`] turns the identity into an
//!    [`Ability`], at most once per request
//! 4. route-class and route-level policies are evaluated against it
//!
//! [`RoleGuard`] is the lighter variant: authentication plus role membership.
//! Resolved identity and ability are also published into the request scope
//! (see [`context`]) for downstream code and the outbound forwarder.

pub mod ability;
pub mod actix;
pub mod context;
pub mod factory;
pub mod graphql;
pub mod guard;
pub mod handle;
pub mod identity;
pub mod policy;
pub mod transport;
pub mod verifier;

pub use ability::{Ability, AbilityBuilder, Action, Rule, Subject, ALL_SUBJECTS};
pub use actix::{authorize_request, CurrentAbility, CurrentUser, Guarded, HttpAuthError, RequestScope};
pub use context::{
    current_ability, current_credential, current_identity, current_request, seed_for, ABILITY,
    IDENTITY, RAW_CREDENTIAL, REQUEST_HANDLE, RPC_REQUEST,
};
pub use error_types::AuthError;
pub use factory::{AbilityFactory, RoleAbilityFactory, SUBJECT_ID_PLACEHOLDER};
pub use graphql::{attach_request, authorize_field, to_graphql_error, FieldGuard, GraphQlAuthExt};
pub use guard::{
    rbac_allows, AuthGuard, Authenticator, Authorized, GuardFuture, RequestGuard, RoleGuard,
};
pub use handle::RequestHandle;
pub use identity::{Credential, Identity, SUPERUSER_ROLE};
pub use policy::{PolicyHandler, PolicySet, RouteMetadata};
pub use transport::{
    http_request_handle, rpc_request_handle, synthesize_rpc_request, ExecutionContext,
    Extraction, GraphQlContext, TransportAdapter, TransportKind,
};
pub use verifier::{CredentialVerifier, JwtCredentialVerifier};
