//! Queue RPC handlers
//!
//! Every pattern is guarded by [`AuthGuard`] with the `User` route class
//! policies; messages reach these handlers through
//! [`InboundCredentialLayer`](jwt_propagation::InboundCredentialLayer), so the
//! caller's identity and ability are already attached to the message's
//! request handle.

use std::sync::Arc;

use access_control::{
    Ability, Action, AuthGuard, ExecutionContext, Identity, PolicyHandler, PolicySet,
    RequestGuard, RouteMetadata, Subject,
};
use error_types::{AuthError, RpcError};
use message_queue::{handler_fn, MessageEnvelope, Router};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::abilities::USER_SUBJECT;
use crate::directory::UserDirectory;
use crate::error::{IdentityError, Result};
use crate::models::{patterns, AbilityRules, AccountInfo, FindUserRequest, UserView};

/// Route class shared by every identity pattern: authentication required
static USER_ROUTES: Lazy<Arc<PolicySet>> = Lazy::new(|| Arc::new(PolicySet::new()));

#[derive(Clone)]
pub struct IdentityHandlers {
    guard: Arc<AuthGuard>,
    directory: UserDirectory,
}

impl IdentityHandlers {
    pub fn new(guard: Arc<AuthGuard>, directory: UserDirectory) -> Self {
        Self { guard, directory }
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    async fn authorize(
        &self,
        envelope: &MessageEnvelope,
        route: &RouteMetadata,
    ) -> Result<(Arc<Identity>, Arc<Ability>)> {
        let check = self.guard.check(ExecutionContext::Rpc(envelope), route);
        let authorized = check.await?;

        match (authorized.identity(), authorized.ability()) {
            (Some(identity), Some(ability)) => Ok((identity, ability)),
            _ => Err(IdentityError::Internal(
                "guard admitted a request without an ability".to_string(),
            )),
        }
    }

    pub async fn account_info(&self, envelope: MessageEnvelope) -> Result<AccountInfo> {
        let route = RouteMetadata::for_class(USER_ROUTES.clone());
        let (identity, ability) = self.authorize(&envelope, &route).await?;

        let record = self
            .directory
            .record_seen(identity.subject_id(), identity.roles());
        info!(subject_id = %record.id, "Account info served");

        Ok(AccountInfo {
            id: record.id,
            roles: record.roles,
            first_seen_at: record.first_seen_at,
            ability: rules_of(&ability),
        })
    }

    pub async fn ability_rules(&self, envelope: MessageEnvelope) -> Result<AbilityRules> {
        let route = RouteMetadata::for_class(USER_ROUTES.clone());
        let (identity, ability) = self.authorize(&envelope, &route).await?;
        debug!(subject_id = %identity.subject_id(), rules = ability.rules().len(), "Ability rules served");
        Ok(rules_of(&ability))
    }

    /// Look up one user; the record check runs before the lookup so a
    /// denied caller cannot learn which ids exist
    pub async fn find_user(&self, envelope: MessageEnvelope) -> Result<UserView> {
        let route = RouteMetadata::for_class(USER_ROUTES.clone())
            .policy(PolicyHandler::can(Action::Read, USER_SUBJECT));
        let (identity, ability) = self.authorize(&envelope, &route).await?;

        let request: FindUserRequest = envelope.payload()?;
        if request.id.trim().is_empty() {
            return Err(IdentityError::InvalidRequest("id must not be empty".to_string()));
        }

        let subject = json!({ "id": request.id });
        if ability.cannot(Action::Read, Subject::instance(USER_SUBJECT, &subject)) {
            return Err(AuthError::Forbidden(format!(
                "{} may not read User {}",
                identity.subject_id(),
                request.id
            ))
            .into());
        }

        let record = self
            .directory
            .get(&request.id)
            .ok_or_else(|| IdentityError::UserNotFound(request.id.clone()))?;

        Ok(UserView {
            id: record.id,
            roles: record.roles,
            first_seen_at: record.first_seen_at,
            last_seen_at: record.last_seen_at,
        })
    }

    /// Pattern router over these handlers
    pub fn router(self) -> Router {
        let handlers = Arc::new(self);

        let account = Arc::clone(&handlers);
        let rules = Arc::clone(&handlers);
        let find = handlers;

        Router::new()
            .route(
                patterns::ACCOUNT_INFO,
                handler_fn(move |envelope: MessageEnvelope| {
                    let handlers = Arc::clone(&account);
                    async move { reply(handlers.account_info(envelope).await) }
                }),
            )
            .route(
                patterns::ABILITY_RULES,
                handler_fn(move |envelope: MessageEnvelope| {
                    let handlers = Arc::clone(&rules);
                    async move { reply(handlers.ability_rules(envelope).await) }
                }),
            )
            .route(
                patterns::FIND_USER,
                handler_fn(move |envelope: MessageEnvelope| {
                    let handlers = Arc::clone(&find);
                    async move { reply(handlers.find_user(envelope).await) }
                }),
            )
    }
}

fn rules_of(ability: &Ability) -> AbilityRules {
    AbilityRules {
        unrestricted: ability.is_unrestricted(),
        rules: ability.rules().to_vec(),
    }
}

fn reply<T: serde::Serialize>(result: Result<T>) -> std::result::Result<Value, RpcError> {
    let value = result.map_err(RpcError::from)?;
    serde_json::to_value(value).map_err(|e| RpcError::from(IdentityError::Internal(e.to_string())))
}
