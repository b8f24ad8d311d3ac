//! Field guards on an async-graphql schema

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use access_control::{
    attach_request, Ability, AbilityFactory, Action, AuthGuard, Authenticator, FieldGuard,
    GraphQlAuthExt, Identity, JwtCredentialVerifier, PolicyHandler, RoleAbilityFactory,
    RouteMetadata,
};
use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Request, Schema, Value};
use async_trait::async_trait;
use crypto_core::test_utils::{test_verifier, token_for};

struct CountingFactory(AtomicUsize);

#[async_trait]
impl AbilityFactory for CountingFactory {
    async fn create_ability(&self, identity: &Identity) -> anyhow::Result<Ability> {
        self.0.fetch_add(1, Ordering::SeqCst);
        RoleAbilityFactory::new()
            .role("Viewer", |rules| rules.can(Action::Read, "Widget"))
            .create_ability(identity)
            .await
    }
}

fn read_widgets() -> FieldGuard {
    FieldGuard::policies(RouteMetadata::new().policy(PolicyHandler::can(Action::Read, "Widget")))
}

fn update_widgets() -> FieldGuard {
    FieldGuard::policies(RouteMetadata::new().policy(PolicyHandler::can(Action::Update, "Widget")))
}

fn admins() -> FieldGuard {
    FieldGuard::roles(["Admin"], RouteMetadata::new())
}

fn public() -> FieldGuard {
    FieldGuard::policies(RouteMetadata::new().allow_anonymous())
}

struct Query;

#[Object]
impl Query {
    #[graphql(guard = "read_widgets()")]
    async fn widgets(&self) -> Vec<String> {
        vec!["w1".to_string()]
    }

    #[graphql(guard = "read_widgets()")]
    async fn widget_count(&self) -> i32 {
        1
    }

    #[graphql(guard = "update_widgets()")]
    async fn draft(&self) -> String {
        "draft".to_string()
    }

    #[graphql(guard = "admins()")]
    async fn audit_log(&self) -> Vec<String> {
        Vec::new()
    }

    #[graphql(guard = "public()")]
    async fn version(&self) -> &str {
        "1"
    }

    #[graphql(guard = "read_widgets()")]
    async fn me(&self, ctx: &Context<'_>) -> Option<String> {
        ctx.current_identity().map(|identity| identity.subject_id().to_string())
    }
}

type TestSchema = Schema<Query, EmptyMutation, EmptySubscription>;

fn schema(factory: Arc<CountingFactory>) -> TestSchema {
    let authenticator = Authenticator::new(Arc::new(JwtCredentialVerifier::new(test_verifier())));
    Schema::build(Query, EmptyMutation, EmptySubscription)
        .data(AuthGuard::new(authenticator, factory))
        .finish()
}

fn request(query: &str, token: Option<&str>) -> Request {
    let mut http = actix_web::test::TestRequest::default();
    if let Some(token) = token {
        http = http.insert_header(("Authorization", format!("Bearer {token}")));
    }
    attach_request(Request::new(query), &http.to_http_request())
}

fn error_code(response: &async_graphql::Response) -> Option<Value> {
    response
        .errors
        .first()
        .and_then(|error| error.extensions.as_ref())
        .and_then(|extensions| extensions.get("code").cloned())
}

#[actix_web::test]
async fn test_fields_share_one_ability() {
    let factory = Arc::new(CountingFactory(AtomicUsize::new(0)));
    let schema = schema(factory.clone());
    let token = token_for("u1", &["Viewer"]);

    let response = schema
        .execute(request("{ widgets widgetCount me }", Some(&token)))
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["me"], "u1");
    assert_eq!(factory.0.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_policy_denial_carries_code() {
    let schema = schema(Arc::new(CountingFactory(AtomicUsize::new(0))));
    let token = token_for("u1", &["Viewer"]);

    let response = schema.execute(request("{ draft }", Some(&token))).await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Forbidden");
    assert_eq!(error_code(&response), Some(Value::from("FORBIDDEN")));
}

#[actix_web::test]
async fn test_missing_credential() {
    let schema = schema(Arc::new(CountingFactory(AtomicUsize::new(0))));

    let response = schema.execute(request("{ widgets }", None)).await;
    assert_eq!(error_code(&response), Some(Value::from("UNAUTHORIZED")));

    let response = schema.execute(request("{ version }", None)).await;
    assert!(response.errors.is_empty());
}

#[actix_web::test]
async fn test_role_field() {
    let schema = schema(Arc::new(CountingFactory(AtomicUsize::new(0))));

    let viewer = token_for("u1", &["Viewer"]);
    let response = schema.execute(request("{ auditLog }", Some(&viewer))).await;
    assert_eq!(error_code(&response), Some(Value::from("FORBIDDEN")));

    let root = token_for("root", &["Super"]);
    let response = schema.execute(request("{ auditLog draft }", Some(&root))).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
}

#[tokio::test]
async fn test_operation_without_request_handle() {
    let schema = schema(Arc::new(CountingFactory(AtomicUsize::new(0))));

    let response = schema.execute(Request::new("{ widgets }")).await;
    assert_eq!(error_code(&response), Some(Value::from("UNSUPPORTED_TRANSPORT")));
}

#[tokio::test]
async fn test_schema_without_guard_data() {
    let schema = Schema::build(Query, EmptyMutation, EmptySubscription).finish();
    let response = schema.execute(Request::new("{ widgets }")).await;
    assert_eq!(error_code(&response), Some(Value::from("INTERNAL_ERROR")));
}
