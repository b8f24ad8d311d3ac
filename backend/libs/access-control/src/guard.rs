//! Authorization guard pipeline
//!
//! ```text
//! AnonymousCheck ──anonymous──────────────────────────────► ALLOWED
//!       │
//!    Extract ──no credential──► DENIED(Unauthenticated)
//!       │
//! Authenticate ──verify failed──► DENIED(Unauthenticated)
//!       │
//!   ┌───┴──────────────┐
//!   │ AuthGuard        │ RoleGuard
//!   ▼                  ▼
//! Ability (memoized)   roles empty / Super / any accepted role ──► ALLOWED
//!   │                  otherwise ──► DENIED(Forbidden)
//! Policies (class, then method, all must pass)
//!   ├─ any false ──► DENIED(Forbidden)
//!   └─ else ──► ALLOWED
//! ```
//!
//! Guards are split into a synchronous admission step, which reads the
//! transport context, and a `Send` future for everything that suspends. The
//! future never borrows the transport context, so callers holding a
//! non-`Send` request can still await it from a multithreaded executor.

use std::sync::Arc;

use error_types::AuthError;
use futures::future::BoxFuture;
use request_context::RequestContext;
use tracing::{debug, error, warn};

use crate::ability::Ability;
use crate::context::{ABILITY, IDENTITY};
use crate::factory::AbilityFactory;
use crate::handle::RequestHandle;
use crate::identity::Identity;
use crate::policy::RouteMetadata;
use crate::transport::{ExecutionContext, Extraction, TransportAdapter};
use crate::verifier::CredentialVerifier;

/// Successful guard outcome
#[derive(Debug, Clone)]
pub enum Authorized {
    /// Route allows anonymous access; nothing was resolved
    Anonymous,
    Principal(RequestHandle),
}

impl Authorized {
    pub fn handle(&self) -> Option<&RequestHandle> {
        match self {
            Authorized::Anonymous => None,
            Authorized::Principal(handle) => Some(handle),
        }
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.handle().and_then(RequestHandle::identity)
    }

    pub fn ability(&self) -> Option<Arc<Ability>> {
        self.handle().and_then(RequestHandle::ability)
    }
}

pub type GuardFuture<'a> = BoxFuture<'a, Result<Authorized, AuthError>>;

/// A guard usable from any transport integration
pub trait RequestGuard: Send + Sync {
    fn check<'a>(&'a self, ctx: ExecutionContext<'_>, route: &'a RouteMetadata) -> GuardFuture<'a>;
}

impl<G: RequestGuard + ?Sized> RequestGuard for Arc<G> {
    fn check<'a>(&'a self, ctx: ExecutionContext<'_>, route: &'a RouteMetadata) -> GuardFuture<'a> {
        (**self).check(ctx, route)
    }
}

/// Anonymous check, extraction and authentication, shared by both guards
#[derive(Clone)]
pub struct Authenticator {
    adapter: TransportAdapter,
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            adapter: TransportAdapter::new(verifier),
        }
    }

    pub fn adapter(&self) -> &TransportAdapter {
        &self.adapter
    }

    /// `Ok(None)` when the route is anonymous
    pub fn admit(
        &self,
        ctx: ExecutionContext<'_>,
        route: &RouteMetadata,
    ) -> Result<Option<Extraction>, AuthError> {
        if route.is_anonymous() {
            debug!(transport = %ctx.kind(), "Anonymous route, skipping authentication");
            return Ok(None);
        }

        let extraction = self.adapter.extract(ctx)?;
        if extraction.credential.is_none() {
            warn!(transport = %ctx.kind(), "Missing bearer credential");
            return Err(AuthError::Unauthenticated(
                "missing bearer credential".to_string(),
            ));
        }
        Ok(Some(extraction))
    }

    /// Resolve the identity, verifying the credential unless the handle
    /// already carries one
    pub async fn authenticate(
        &self,
        extraction: Extraction,
    ) -> Result<(RequestHandle, Arc<Identity>), AuthError> {
        let Extraction { handle, credential } = extraction;

        let identity = match handle.identity() {
            Some(identity) => identity,
            None => {
                let credential = credential.ok_or_else(|| {
                    AuthError::Unauthenticated("missing bearer credential".to_string())
                })?;
                let identity = self
                    .adapter
                    .verifier()
                    .verify(&credential)
                    .await
                    .map_err(|e| {
                        warn!(transport = %handle.transport(), error = %e, "Credential rejected");
                        e
                    })?;
                handle.attach_identity(identity)
            }
        };

        RequestContext::set(&IDENTITY, Arc::clone(&identity));
        Ok((handle, identity))
    }
}

/// Full pipeline: authentication, memoized ability, declarative policies
#[derive(Clone)]
pub struct AuthGuard {
    authenticator: Authenticator,
    factory: Arc<dyn AbilityFactory>,
}

impl AuthGuard {
    pub fn new(authenticator: Authenticator, factory: Arc<dyn AbilityFactory>) -> Self {
        Self {
            authenticator,
            factory,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn factory(&self) -> &Arc<dyn AbilityFactory> {
        &self.factory
    }

    /// Steps 4-5: compute (or reuse) the ability, then evaluate policies
    pub async fn authorize(
        &self,
        handle: &RequestHandle,
        identity: &Identity,
        route: &RouteMetadata,
    ) -> Result<Arc<Ability>, AuthError> {
        let ability = handle
            .ability_or_init(self.factory.as_ref(), identity)
            .await
            .map_err(|e| {
                error!(subject_id = %identity.subject_id(), error = %e, "Ability factory failed");
                AuthError::Internal(format!("ability computation failed: {e}"))
            })?;
        RequestContext::set(&ABILITY, Arc::clone(&ability));

        if ability.is_unrestricted() {
            debug!(subject_id = %identity.subject_id(), "Unrestricted ability, policies skipped");
            return Ok(ability);
        }

        for policy in route.policies() {
            if !policy.evaluate(&ability) {
                warn!(
                    subject_id = %identity.subject_id(),
                    policy = %policy.name(),
                    "Policy denied request"
                );
                return Err(AuthError::Forbidden(format!("policy {} denied", policy.name())));
            }
        }

        debug!(subject_id = %identity.subject_id(), "Request authorized");
        Ok(ability)
    }
}

impl RequestGuard for AuthGuard {
    fn check<'a>(&'a self, ctx: ExecutionContext<'_>, route: &'a RouteMetadata) -> GuardFuture<'a> {
        let admitted = self.authenticator.admit(ctx, route);

        Box::pin(async move {
            let Some(extraction) = admitted? else {
                return Ok(Authorized::Anonymous);
            };
            let (handle, identity) = self.authenticator.authenticate(extraction).await?;
            self.authorize(&handle, &identity, route).await?;
            Ok(Authorized::Principal(handle))
        })
    }
}

/// Role membership check
///
/// Empty list: any authenticated identity. Otherwise the superuser role or
/// at least one of the listed roles.
pub fn rbac_allows(identity: &Identity, accepted: &[String]) -> bool {
    accepted.is_empty() || identity.is_superuser() || accepted.iter().any(|role| identity.has_role(role))
}

/// Authentication plus role membership; no ability is computed
#[derive(Clone)]
pub struct RoleGuard {
    authenticator: Authenticator,
    roles: Arc<[String]>,
}

impl RoleGuard {
    pub fn new<I, S>(authenticator: Authenticator, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authenticator,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Any authenticated identity
    pub fn authenticated(authenticator: Authenticator) -> Self {
        Self::new(authenticator, Vec::<String>::new())
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl RequestGuard for RoleGuard {
    fn check<'a>(&'a self, ctx: ExecutionContext<'_>, route: &'a RouteMetadata) -> GuardFuture<'a> {
        let admitted = self.authenticator.admit(ctx, route);

        Box::pin(async move {
            let Some(extraction) = admitted? else {
                return Ok(Authorized::Anonymous);
            };
            let (handle, identity) = self.authenticator.authenticate(extraction).await?;

            if !rbac_allows(&identity, &self.roles) {
                warn!(
                    subject_id = %identity.subject_id(),
                    required = ?self.roles,
                    "Role check failed"
                );
                return Err(AuthError::Forbidden(format!(
                    "requires one of roles {:?}",
                    self.roles
                )));
            }
            Ok(Authorized::Principal(handle))
        })
    }
}
