//! Guards shared by the REST routes and the GraphQL schema

use std::sync::Arc;

use access_control::{AuthGuard, Authenticator, CredentialVerifier, RoleGuard};

use crate::abilities::gateway_abilities;

#[derive(Clone)]
pub struct Guards {
    /// Policies against the caller's ability
    pub auth: Arc<AuthGuard>,
    /// Any authenticated caller
    pub authenticated: Arc<RoleGuard>,
    pub admin: Arc<RoleGuard>,
}

impl Guards {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        let authenticator = Authenticator::new(verifier);

        Self {
            auth: Arc::new(AuthGuard::new(
                authenticator.clone(),
                Arc::new(gateway_abilities()),
            )),
            authenticated: Arc::new(RoleGuard::authenticated(authenticator.clone())),
            admin: Arc::new(RoleGuard::new(authenticator, ["Admin"])),
        }
    }
}
