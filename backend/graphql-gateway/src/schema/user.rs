//! Account and user schema and resolvers

use access_control::{
    Ability, Action, FieldGuard, GraphQlAuthExt, PolicyHandler, RouteMetadata, Rule,
};
use async_graphql::{Context, Json, Object, Result as GraphQLResult, SimpleObject};
use identity_service::models::{AbilityRules, AccountInfo, UserView};
use serde_json::{Map, Value};

use crate::abilities::USER_SUBJECT;
use crate::clients::ServiceClients;
use crate::error::GatewayError;

#[derive(SimpleObject, Clone, Debug)]
pub struct PermissionRule {
    pub action: String,
    pub subject: String,
    pub conditions: Option<Json<Map<String, Value>>>,
    pub inverted: bool,
    pub reason: Option<String>,
}

impl From<&Rule> for PermissionRule {
    fn from(rule: &Rule) -> Self {
        PermissionRule {
            action: rule.action.to_string(),
            subject: rule.subject.clone(),
            conditions: rule.conditions.clone().map(Json),
            inverted: rule.inverted,
            reason: rule.reason.clone(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct AbilitySet {
    pub unrestricted: bool,
    pub rules: Vec<PermissionRule>,
}

impl From<&AbilityRules> for AbilitySet {
    fn from(rules: &AbilityRules) -> Self {
        AbilitySet {
            unrestricted: rules.unrestricted,
            rules: rules.rules.iter().map(PermissionRule::from).collect(),
        }
    }
}

impl From<&Ability> for AbilitySet {
    fn from(ability: &Ability) -> Self {
        AbilitySet {
            unrestricted: ability.is_unrestricted(),
            rules: ability.rules().iter().map(PermissionRule::from).collect(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct Account {
    pub id: String,
    pub roles: Vec<String>,
    pub first_seen_at: String,
    pub ability: AbilitySet,
}

impl From<AccountInfo> for Account {
    fn from(account: AccountInfo) -> Self {
        Account {
            ability: AbilitySet::from(&account.ability),
            id: account.id,
            roles: account.roles,
            first_seen_at: account.first_seen_at.to_rfc3339(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct User {
    pub id: String,
    pub roles: Vec<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

impl From<UserView> for User {
    fn from(user: UserView) -> Self {
        User {
            id: user.id,
            roles: user.roles,
            first_seen_at: user.first_seen_at.to_rfc3339(),
            last_seen_at: user.last_seen_at.to_rfc3339(),
        }
    }
}

/// Caller's identity as resolved by the gateway
#[derive(SimpleObject, Clone, Debug)]
pub struct Session {
    pub subject_id: String,
    pub roles: Vec<String>,
    pub ability: AbilitySet,
}

fn clients<'a>(ctx: &Context<'a>) -> GraphQLResult<&'a ServiceClients> {
    ctx.data::<ServiceClients>()
        .map_err(|_| "Service clients not available".into())
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// Public liveness field
    async fn status(&self) -> String {
        "ok".to_string()
    }

    #[graphql(guard = "FieldGuard::roles(Vec::<String>::new(), RouteMetadata::new())")]
    async fn account(&self, ctx: &Context<'_>) -> GraphQLResult<Account> {
        let account = clients(ctx)?
            .account_info()
            .await
            .map_err(|e| GatewayError::from(e).to_graphql_error())?;
        Ok(account.into())
    }

    #[graphql(guard = "FieldGuard::policies(RouteMetadata::new())")]
    async fn session(&self, ctx: &Context<'_>) -> GraphQLResult<Session> {
        let identity = ctx.current_identity().ok_or("No identity resolved")?;
        let ability = ctx.current_ability().ok_or("No ability computed")?;

        Ok(Session {
            subject_id: identity.subject_id().to_string(),
            roles: identity.roles().to_vec(),
            ability: AbilitySet::from(ability.as_ref()),
        })
    }

    #[graphql(guard = "FieldGuard::policies(RouteMetadata::new().policy(PolicyHandler::can(Action::Read, USER_SUBJECT)))")]
    async fn user(&self, ctx: &Context<'_>, id: String) -> GraphQLResult<Option<User>> {
        match clients(ctx)?.find_user(&id).await {
            Ok(user) => Ok(Some(user.into())),
            Err(e) if e.status_code() == 404 => Ok(None),
            Err(e) => Err(GatewayError::from(e).to_graphql_error()),
        }
    }

    #[graphql(guard = "FieldGuard::roles([\"Admin\"], RouteMetadata::new())")]
    async fn admin_user(&self, ctx: &Context<'_>, id: String) -> GraphQLResult<User> {
        let user = clients(ctx)?
            .find_user(&id)
            .await
            .map_err(|e| GatewayError::from(e).to_graphql_error())?;
        Ok(user.into())
    }
}
