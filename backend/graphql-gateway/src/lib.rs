//! GraphQL Gateway Library
//! Re-exports modules for testing and integration

pub mod abilities;
pub mod clients;
pub mod config;
pub mod embedded;
pub mod error;
pub mod guards;
pub mod rest_api;
pub mod schema;

use std::sync::Arc;

use access_control::CredentialVerifier;
use actix_web::web;

use clients::ServiceClients;
use guards::Guards;
use schema::{build_schema, graphql_handler, AppSchema};

/// Everything the HTTP workers share
#[derive(Clone)]
pub struct AppState {
    pub clients: ServiceClients,
    pub guards: Guards,
    pub schema: AppSchema,
}

impl AppState {
    pub fn new(clients: ServiceClients, verifier: Arc<dyn CredentialVerifier>, introspection: bool) -> Self {
        let guards = Guards::new(verifier);
        let schema = build_schema(clients.clone(), (*guards.auth).clone(), introspection);

        Self {
            clients,
            guards,
            schema,
        }
    }
}

/// Register app data, the GraphQL endpoint and the REST routes
///
/// The app must be wrapped in [`RequestScope`](access_control::RequestScope)
/// so that guards and forwarded calls see the request's credential.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.clients.clone()))
        .app_data(web::Data::new(state.schema.clone()))
        .route("/graphql", web::post().to(graphql_handler));
    rest_api::configure(cfg, &state.guards);
}
