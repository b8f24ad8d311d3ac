//! async-graphql integration
//!
//! The HTTP handler serving `/graphql` attaches the request's handle to the
//! operation with [`attach_request`]; field guards then authorize against the
//! same handle the HTTP layer built, so an ability computed for one field is
//! reused by every other field of the same operation.

use std::sync::Arc;

use actix_web::HttpRequest;
use async_graphql::{Context, ErrorExtensions, Guard};
use error_types::AuthError;

use crate::ability::Ability;
use crate::context;
use crate::guard::{AuthGuard, Authorized, RequestGuard, RoleGuard};
use crate::handle::RequestHandle;
use crate::identity::Identity;
use crate::policy::RouteMetadata;
use crate::transport::{http_request_handle, ExecutionContext, GraphQlContext};

impl<'a> GraphQlContext for Context<'a> {
    fn request_handle(&self) -> Option<RequestHandle> {
        self.data_opt::<RequestHandle>().cloned()
    }
}

fn execution_context<'a>(ctx: &'a Context<'_>) -> ExecutionContext<'a> {
    let gql: &(dyn GraphQlContext + Sync) = ctx;
    ExecutionContext::GraphQl(gql)
}

/// Attach the HTTP request's handle to a GraphQL request
pub fn attach_request(request: async_graphql::Request, http: &HttpRequest) -> async_graphql::Request {
    request.data(http_request_handle(http))
}

/// GraphQL error with `code` and `status` extensions
pub fn to_graphql_error(err: &AuthError) -> async_graphql::Error {
    let code = err.code();
    let status = i32::from(err.status_code());
    async_graphql::Error::new(err.public_message()).extend_with(|_, extensions| {
        extensions.set("code", code);
        extensions.set("status", status);
    })
}

#[derive(Debug, Clone)]
enum Mode {
    Policies,
    Roles(Vec<String>),
}

/// Field guard backed by the [`AuthGuard`] registered in schema data
///
/// ```rust,ignore
/// #[graphql(guard = "FieldGuard::policies(widget_route())")]
/// async fn widgets(&self, ctx: &Context<'_>) -> Result<Vec<Widget>> { .. }
/// ```
#[derive(Debug, Clone)]
pub struct FieldGuard {
    mode: Mode,
    route: RouteMetadata,
}

impl FieldGuard {
    pub fn policies(route: RouteMetadata) -> Self {
        Self {
            mode: Mode::Policies,
            route,
        }
    }

    /// Role membership only; an empty list admits any authenticated caller
    pub fn roles<I, S>(roles: I, route: RouteMetadata) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: Mode::Roles(roles.into_iter().map(Into::into).collect()),
            route,
        }
    }
}

impl Guard for FieldGuard {
    async fn check(&self, ctx: &Context<'_>) -> async_graphql::Result<()> {
        let guard = ctx.data_opt::<AuthGuard>().ok_or_else(|| {
            tracing::error!("AuthGuard missing from schema data");
            to_graphql_error(&AuthError::Internal("guard not configured".to_string()))
        })?;

        let outcome = match &self.mode {
            Mode::Policies => {
                let check = guard.check(execution_context(ctx), &self.route);
                check.await
            }
            Mode::Roles(roles) => {
                let role_guard = RoleGuard::new(guard.authenticator().clone(), roles.iter().cloned());
                let check = role_guard.check(execution_context(ctx), &self.route);
                check.await
            }
        };

        outcome.map(|_| ()).map_err(|e| to_graphql_error(&e))
    }
}

/// Resolver access to the authorization state of the current operation
pub trait GraphQlAuthExt {
    fn current_identity(&self) -> Option<Arc<Identity>>;

    fn current_ability(&self) -> Option<Arc<Ability>>;
}

impl GraphQlAuthExt for Context<'_> {
    fn current_identity(&self) -> Option<Arc<Identity>> {
        self.request_handle()
            .and_then(|handle| handle.identity())
            .or_else(context::current_identity)
    }

    fn current_ability(&self) -> Option<Arc<Ability>> {
        self.request_handle()
            .and_then(|handle| handle.ability())
            .or_else(context::current_ability)
    }
}

/// Run the schema's [`AuthGuard`] from inside a resolver
///
/// For per-record checks after the resolver has loaded data.
pub async fn authorize_field(ctx: &Context<'_>, route: &RouteMetadata) -> async_graphql::Result<Authorized> {
    let guard = ctx
        .data_opt::<AuthGuard>()
        .ok_or_else(|| to_graphql_error(&AuthError::Internal("guard not configured".to_string())))?;
    let check = guard.check(execution_context(ctx), route);
    check.await.map_err(|e| to_graphql_error(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_extensions() {
        let err = to_graphql_error(&AuthError::Forbidden("can(update, Widget)".into()));
        assert_eq!(err.message, "Forbidden");

        let extensions = err.extensions.unwrap();
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("FORBIDDEN"))
        );
        assert_eq!(extensions.get("status"), Some(&async_graphql::Value::from(403)));
    }
}
