//! GraphQL Schema
//!
//! Fields are guarded declaratively with [`FieldGuard`](access_control::FieldGuard);
//! the guards authorize against the handle of the HTTP request carrying the
//! operation, attached by [`graphql_handler`].

pub mod notification;
pub mod user;

use access_control::{attach_request, AuthGuard};
use actix_web::{web, HttpRequest};
use async_graphql::{EmptySubscription, MergedObject, Schema};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::clients::ServiceClients;

/// Root query object
#[derive(MergedObject, Default)]
pub struct QueryRoot(user::UserQuery);

/// Root mutation object
#[derive(MergedObject, Default)]
pub struct MutationRoot(notification::NotificationMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(clients: ServiceClients, guard: AuthGuard, introspection: bool) -> AppSchema {
    let builder = Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(clients)
        .data(guard);

    if introspection {
        builder.finish()
    } else {
        builder.disable_introspection().finish()
    }
}

pub async fn graphql_handler(
    schema: web::Data<AppSchema>,
    http: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let request = attach_request(req.into_inner(), &http);
    schema.execute(request).await.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use access_control::{Authenticator, JwtCredentialVerifier};
    use crypto_core::test_utils::test_verifier;
    use message_queue::LocalBus;

    use crate::abilities::gateway_abilities;
    use crate::config::QueueConfig;

    #[tokio::test]
    async fn test_schema_builds() {
        let queues = QueueConfig {
            identity_queue: "identity".into(),
            notification_queue: "notifications".into(),
            kafka_brokers: Vec::new(),
            rpc_timeout: std::time::Duration::from_secs(1),
        };
        let guard = AuthGuard::new(
            Authenticator::new(Arc::new(JwtCredentialVerifier::new(test_verifier()))),
            Arc::new(gateway_abilities()),
        );
        let schema = build_schema(ServiceClients::local(&LocalBus::new(), &queues), guard, true);

        let sdl = schema.sdl();
        assert!(sdl.contains("type Query"));
        assert!(sdl.contains("sendNotification"));
    }
}
