/// REST API v1 Module
///
/// HTTP endpoints translated into queue calls to the backend services.
///
/// Architecture:
/// ```text
/// Client (HTTP REST, Authorization: Bearer <token>)
///     ↓
/// RequestScope (request scope + credential capture)
///     ↓
/// Guarded (route guard + metadata)
///     ↓
/// REST API Handler (this module)
///     ↓
/// ForwardingClient → queue → backend service
/// ```
pub mod account;
pub mod notifications;
pub mod users;

use std::sync::Arc;

use access_control::{Action, Guarded, PolicyHandler, PolicySet, RouteMetadata};
use actix_web::web;
use once_cell::sync::Lazy;

use crate::abilities::{NOTIFICATION_SUBJECT, USER_SUBJECT};
use crate::guards::Guards;

/// Account routes: any authenticated caller
static ACCOUNT_ROUTES: Lazy<Arc<PolicySet>> = Lazy::new(|| Arc::new(PolicySet::new()));

/// User routes: reading users in general
static USER_ROUTES: Lazy<Arc<PolicySet>> = Lazy::new(|| {
    Arc::new(PolicySet::new().policy(PolicyHandler::can(Action::Read, USER_SUBJECT)))
});

pub async fn health() -> &'static str {
    "ok"
}

pub fn configure(cfg: &mut web::ServiceConfig, guards: &Guards) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/api/v1")
            .service(
                web::resource("/status")
                    .wrap(Guarded::new(
                        guards.auth.clone(),
                        RouteMetadata::for_class(ACCOUNT_ROUTES.clone()).allow_anonymous(),
                    ))
                    .route(web::get().to(account::status)),
            )
            .service(
                web::resource("/account")
                    .wrap(Guarded::new(guards.authenticated.clone(), RouteMetadata::new()))
                    .route(web::get().to(account::account_info)),
            )
            .service(
                web::resource("/account/abilities")
                    .wrap(Guarded::new(
                        guards.auth.clone(),
                        RouteMetadata::for_class(ACCOUNT_ROUTES.clone()),
                    ))
                    .route(web::get().to(account::ability_rules)),
            )
            .service(
                web::resource("/session")
                    .wrap(Guarded::new(
                        guards.auth.clone(),
                        RouteMetadata::for_class(ACCOUNT_ROUTES.clone()),
                    ))
                    .route(web::get().to(account::session)),
            )
            .service(
                web::resource("/users/{id}")
                    .wrap(Guarded::new(
                        guards.auth.clone(),
                        RouteMetadata::for_class(USER_ROUTES.clone()),
                    ))
                    .route(web::get().to(users::get_user)),
            )
            .service(
                web::resource("/admin/users/{id}")
                    .wrap(Guarded::new(guards.admin.clone(), RouteMetadata::new()))
                    .route(web::get().to(users::get_user)),
            )
            .service(
                web::resource("/notifications")
                    .wrap(Guarded::new(
                        guards.auth.clone(),
                        RouteMetadata::new()
                            .policy(PolicyHandler::can(Action::Create, NOTIFICATION_SUBJECT)),
                    ))
                    .route(web::post().to(notifications::send_notification)),
            ),
    );
}
