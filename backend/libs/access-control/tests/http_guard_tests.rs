//! Guards mounted on an actix-web app

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use access_control::{
    current_credential, Ability, AbilityFactory, Action, AuthGuard, Authenticator, CurrentAbility,
    CurrentUser, Guarded, Identity, JwtCredentialVerifier, PolicyHandler, PolicySet,
    RoleAbilityFactory, RoleGuard, RouteMetadata,
};
use actix_web::{http::StatusCode, test, web, App, HttpResponse};
use async_trait::async_trait;
use crypto_core::test_utils::{test_verifier, token_for, FOREIGN_PRIVATE_KEY};
use crypto_core::JwtIssuer;
use serde_json::{json, Value};

struct CountingFactory {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }
}

#[async_trait]
impl AbilityFactory for CountingFactory {
    async fn create_ability(&self, identity: &Identity) -> anyhow::Result<Ability> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("role table unavailable");
        }
        let factory = RoleAbilityFactory::new()
            .role("Viewer", |rules| rules.can(Action::Read, "Widget"))
            .role("Editor", |rules| {
                rules.can(Action::Read, "Widget").can(Action::Update, "Widget")
            });
        factory.create_ability(identity).await
    }
}

fn authenticator() -> Authenticator {
    Authenticator::new(Arc::new(JwtCredentialVerifier::new(test_verifier())))
}

fn widgets_class() -> Arc<PolicySet> {
    Arc::new(PolicySet::new().policy(PolicyHandler::can(Action::Read, "Widget")))
}

async fn whoami(user: CurrentUser, ability: CurrentAbility) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "subject_id": user.0.subject_id(),
        "can_update": ability.0.can(Action::Update, "Widget"),
        "forwarded": current_credential().map(|c| c.token().to_string()),
    }))
}

async fn plain() -> HttpResponse {
    HttpResponse::Ok().finish()
}

macro_rules! app {
    ($factory:expr) => {{
        let guard = Arc::new(AuthGuard::new(authenticator(), $factory));
        let admin = Arc::new(RoleGuard::new(authenticator(), ["Admin"]));
        test::init_service(
            App::new()
                .wrap(access_control::RequestScope)
                .service(
                    web::resource("/health")
                        .wrap(Guarded::new(
                            guard.clone(),
                            RouteMetadata::for_class(widgets_class()).allow_anonymous(),
                        ))
                        .route(web::get().to(plain)),
                )
                .service(
                    web::resource("/widgets")
                        .wrap(Guarded::new(guard.clone(), RouteMetadata::for_class(widgets_class())))
                        .route(web::get().to(whoami)),
                )
                .service(
                    web::resource("/widgets/{id}")
                        .wrap(Guarded::new(
                            guard.clone(),
                            RouteMetadata::for_class(widgets_class())
                                .policy(PolicyHandler::can(Action::Update, "Widget")),
                        ))
                        .route(web::put().to(plain)),
                )
                .service(
                    web::resource("/admin")
                        .wrap(Guarded::new(admin, RouteMetadata::new()))
                        .route(web::get().to(plain)),
                ),
        )
        .await
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

async fn error_code(resp: actix_web::dev::ServiceResponse) -> Value {
    let body: Value = test::read_body_json(resp).await;
    body["error"].clone()
}

#[actix_web::test]
async fn test_anonymous_route_needs_no_credential() {
    let app = app!(CountingFactory::new());
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_missing_credential_is_401() {
    let app = app!(CountingFactory::new());
    let resp = test::call_service(&app, test::TestRequest::get().uri("/widgets").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(resp).await, "UNAUTHORIZED");
}

#[actix_web::test]
async fn test_foreign_signature_is_401() {
    let app = app!(CountingFactory::new());
    let token = JwtIssuer::from_rsa_pem(FOREIGN_PRIVATE_KEY)
        .unwrap()
        .issue("u1", &["Super"])
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/widgets")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_CREDENTIAL");
}

#[actix_web::test]
async fn test_viewer_reads_but_cannot_update() {
    let app = app!(CountingFactory::new());
    let token = token_for("u1", &["Viewer"]);

    let req = test::TestRequest::get()
        .uri("/widgets")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["subject_id"], "u1");
    assert_eq!(body["can_update"], false);
    assert_eq!(body["forwarded"], token.as_str());

    let req = test::TestRequest::put()
        .uri("/widgets/w1")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(resp).await, "FORBIDDEN");
}

#[actix_web::test]
async fn test_editor_updates() {
    let app = app!(CountingFactory::new());
    let req = test::TestRequest::put()
        .uri("/widgets/w1")
        .insert_header(bearer(&token_for("u2", &["Editor"])))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_superuser_passes_every_guard() {
    let factory = CountingFactory::new();
    let app = app!(factory.clone());
    let token = token_for("root", &["Super"]);

    for (method, uri) in [("GET", "/widgets"), ("PUT", "/widgets/w1"), ("GET", "/admin")] {
        let req = match method {
            "PUT" => test::TestRequest::put(),
            _ => test::TestRequest::get(),
        }
        .uri(uri)
        .insert_header(bearer(&token))
        .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK, "{uri}");
    }
}

#[actix_web::test]
async fn test_role_guard() {
    let app = app!(CountingFactory::new());

    let req = test::TestRequest::get()
        .uri("/admin")
        .insert_header(bearer(&token_for("u1", &["Editor"])))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/admin")
        .insert_header(bearer(&token_for("u1", &["Editor", "Admin"])))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_factory_failure_is_500() {
    let factory = CountingFactory::failing();
    let app = app!(factory.clone());

    let req = test::TestRequest::get()
        .uri("/widgets")
        .insert_header(bearer(&token_for("u1", &["Viewer"])))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(resp).await, "INTERNAL_ERROR");
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_stacked_guards_share_one_ability() {
    let factory = CountingFactory::new();
    let guard = Arc::new(AuthGuard::new(authenticator(), factory.clone()));
    let app = test::init_service(
        App::new().wrap(access_control::RequestScope).service(
            web::resource("/widgets/{id}")
                .wrap(Guarded::new(
                    guard.clone(),
                    RouteMetadata::new().policy(PolicyHandler::can(Action::Update, "Widget")),
                ))
                .wrap(Guarded::new(guard, RouteMetadata::for_class(widgets_class())))
                .route(web::put().to(plain)),
        ),
    )
    .await;

    let req = test::TestRequest::put()
        .uri("/widgets/w1")
        .insert_header(bearer(&token_for("u2", &["Editor"])))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
}
