//! actix-web integration
//!
//! [`RequestScope`] wraps the whole app and opens one request scope per
//! request. [`Guarded`] wraps individual resources with a guard and their
//! route metadata:
//!
//! ```rust,ignore
//! App::new()
//!     .wrap(RequestScope)
//!     .service(
//!         web::resource("/api/v1/widgets")
//!             .wrap(Guarded::new(auth_guard.clone(), list_widgets_route()))
//!             .route(web::get().to(list_widgets)),
//!     )
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use error_types::AuthError;
use futures::future::{ready, Ready};
use request_context::RequestContext;
use serde_json::json;

use crate::ability::Ability;
use crate::context::{current_ability, current_identity, seed_for, REQUEST_HANDLE};
use crate::guard::{Authorized, RequestGuard};
use crate::handle::RequestHandle;
use crate::identity::Identity;
use crate::policy::RouteMetadata;
use crate::transport::{http_request_handle, ExecutionContext};

/// [`AuthError`] rendered as an HTTP response
///
/// Body: `{ "error": "FORBIDDEN", "message": "Forbidden", "status": 403 }`
#[derive(Debug, Clone)]
pub struct HttpAuthError(pub AuthError);

impl fmt::Display for HttpAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<AuthError> for HttpAuthError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl ResponseError for HttpAuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.0.code(),
            "message": self.0.public_message(),
            "status": self.0.status_code(),
        }))
    }
}

/// Opens a request scope around every request
///
/// The scope is seeded with the request handle and, when present, the raw
/// bearer credential, so outbound calls made while serving the request can
/// forward it.
pub struct RequestScope;

impl<S, B> Transform<S, ServiceRequest> for RequestScope
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestScopeService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestScopeService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestScopeService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestScopeService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let handle = http_request_handle(req.request());
        let seed = seed_for(&REQUEST_HANDLE, &handle);

        Box::pin(RequestContext::run(seed, async move {
            tracing::trace!(path = %req.path(), "serving request in scope");
            service.call(req).await
        }))
    }
}

/// Runs a guard before the wrapped resource
///
/// Denials short-circuit with an [`HttpAuthError`] response; the handler is
/// never invoked.
pub struct Guarded<G> {
    guard: Arc<G>,
    route: Arc<RouteMetadata>,
}

impl<G> Guarded<G> {
    pub fn new(guard: Arc<G>, route: RouteMetadata) -> Self {
        Self {
            guard,
            route: Arc::new(route),
        }
    }
}

impl<S, B, G> Transform<S, ServiceRequest> for Guarded<G>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    G: RequestGuard + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = GuardedService<S, G>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GuardedService {
            service: Rc::new(service),
            guard: Arc::clone(&self.guard),
            route: Arc::clone(&self.route),
        }))
    }
}

pub struct GuardedService<S, G> {
    service: Rc<S>,
    guard: Arc<G>,
    route: Arc<RouteMetadata>,
}

impl<S, B, G> Service<ServiceRequest> for GuardedService<S, G>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    G: RequestGuard + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let guard = Arc::clone(&self.guard);
        let route = Arc::clone(&self.route);

        Box::pin(async move {
            let outcome = {
                let check = guard.check(ExecutionContext::Http(req.request()), &route);
                check.await
            };

            match outcome {
                Ok(_) => service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body),
                Err(e) => Ok(req
                    .error_response(HttpAuthError(e))
                    .map_into_right_body()),
            }
        })
    }
}

/// Run `guard` from inside a handler
///
/// For checks that need the handler's own data, such as a loaded record.
pub async fn authorize_request<G>(
    req: &HttpRequest,
    guard: &G,
    route: &RouteMetadata,
) -> Result<Authorized, HttpAuthError>
where
    G: RequestGuard + ?Sized,
{
    let check = guard.check(ExecutionContext::Http(req), route);
    check.await.map_err(HttpAuthError)
}

fn handle_of(req: &HttpRequest) -> Option<RequestHandle> {
    req.extensions().get::<RequestHandle>().cloned()
}

/// Identity resolved by the guard for this request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<Identity>);

impl FromRequest for CurrentUser {
    type Error = HttpAuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = handle_of(req)
            .and_then(|handle| handle.identity())
            .or_else(current_identity);

        ready(identity.map(CurrentUser).ok_or_else(|| {
            HttpAuthError(AuthError::Unauthenticated(
                "no identity resolved for request".to_string(),
            ))
        }))
    }
}

/// Ability computed by the guard for this request
#[derive(Debug, Clone)]
pub struct CurrentAbility(pub Arc<Ability>);

impl FromRequest for CurrentAbility {
    type Error = HttpAuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let ability = handle_of(req)
            .and_then(|handle| handle.ability())
            .or_else(current_ability);

        ready(ability.map(CurrentAbility).ok_or_else(|| {
            HttpAuthError(AuthError::Internal(
                "no ability computed for request".to_string(),
            ))
        }))
    }
}
