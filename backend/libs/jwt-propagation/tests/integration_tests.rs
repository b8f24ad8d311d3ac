//! Integration tests for credential propagation
//!
//! These tests verify the complete flow over an in-process bus:
//! caller scope -> ForwardingClient -> queue -> InboundCredentialLayer -> guard

use std::sync::Arc;

use access_control::{
    current_credential, Action, AuthGuard, Authenticator, Credential, CredentialVerifier,
    ExecutionContext, JwtCredentialVerifier, PolicyHandler, RequestGuard, RoleAbilityFactory,
    RoleGuard, RouteMetadata, RAW_CREDENTIAL,
};
use crypto_core::test_utils::{test_verifier, token_for, FOREIGN_PRIVATE_KEY};
use crypto_core::JwtIssuer;
use jwt_propagation::{ForwardError, ForwardingClient, InboundCredentialLayer};
use message_queue::{
    handler_fn, LocalBus, MessageEnvelope, MessageHandler, MessageTransport, Pattern, RpcError,
    Router, AUTHORIZATION_HEADER,
};
use request_context::{RequestContext, Seed};
use serde_json::{json, Value};

fn verifier() -> Arc<dyn CredentialVerifier> {
    Arc::new(JwtCredentialVerifier::new(test_verifier()))
}

fn factory() -> Arc<RoleAbilityFactory> {
    Arc::new(
        RoleAbilityFactory::new()
            .role("Viewer", |rules| rules.can(Action::Read, "Widget"))
            .role("Editor", |rules| {
                rules.can(Action::Read, "Widget").can(Action::Update, "Widget")
            }),
    )
}

/// Downstream service: `whoami` (role guard, any caller) and `updateWidget`
/// (policy guard)
fn downstream() -> impl MessageHandler {
    let authenticator = Authenticator::new(verifier());
    let any_caller = Arc::new(RoleGuard::authenticated(authenticator.clone()));
    let policies = Arc::new(AuthGuard::new(authenticator, factory()));

    Router::new()
        .route(
            "whoami",
            handler_fn(move |envelope: MessageEnvelope| {
                let guard = Arc::clone(&any_caller);
                async move {
                    let route = RouteMetadata::new();
                    let check = guard.check(ExecutionContext::Rpc(&envelope), &route);
                    let authorized = check.await.map_err(RpcError::from)?;
                    let identity = authorized.identity().ok_or_else(|| RpcError::internal("no identity"))?;
                    Ok::<_, RpcError>(json!({
                        "subject_id": identity.subject_id(),
                        "roles": identity.roles(),
                        "header": envelope.authorization(),
                    }))
                }
            }),
        )
        .route(
            "updateWidget",
            handler_fn(move |envelope: MessageEnvelope| {
                let guard = Arc::clone(&policies);
                async move {
                    let route = RouteMetadata::new().policy(PolicyHandler::can(Action::Update, "Widget"));
                    let check = guard.check(ExecutionContext::Rpc(&envelope), &route);
                    check.await.map_err(RpcError::from)?;
                    Ok::<_, RpcError>(json!({ "updated": true }))
                }
            }),
        )
}

fn bus_with_downstream() -> LocalBus {
    let bus = LocalBus::new();
    bus.bind(
        "downstream",
        Arc::new(InboundCredentialLayer::new(downstream(), verifier(), factory())),
    );
    bus
}

fn scope_for(token: &str) -> Seed {
    Seed::new().with(&RAW_CREDENTIAL, Credential::new(token).unwrap())
}

#[tokio::test]
async fn test_credential_round_trip() {
    let bus = bus_with_downstream();
    let client = ForwardingClient::new(bus.client("downstream"));
    let token = token_for("u1", &["Editor"]);

    let reply: Value = RequestContext::run(scope_for(&token), async {
        client.send("whoami", &()).await.unwrap()
    })
    .await;

    assert_eq!(reply["subject_id"], "u1");
    assert_eq!(reply["roles"], json!(["Editor"]));
    assert_eq!(reply["header"], format!("Bearer {token}"));
}

#[tokio::test]
async fn test_absent_credential_reaches_guard_as_unauthenticated() {
    let bus = bus_with_downstream();
    let client = ForwardingClient::new(bus.client("downstream"));

    let result: Result<Value, ForwardError> = client.send("whoami", &()).await;

    let remote = result.unwrap_err().remote().cloned().unwrap();
    assert_eq!(remote.status, 401);
    assert_eq!(remote.response, "UNAUTHORIZED");
    assert_eq!(remote.name, RpcError::NAME);
}

#[tokio::test]
async fn test_policy_denial_travels_back() {
    let bus = bus_with_downstream();
    let client = ForwardingClient::new(bus.client("downstream"));
    let viewer = token_for("u1", &["Viewer"]);

    let result: Result<Value, ForwardError> = RequestContext::run(scope_for(&viewer), async {
        client.send("updateWidget", &json!({ "id": "w1" })).await
    })
    .await;
    let err = result.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let editor = token_for("u2", &["Editor"]);
    let reply: Value = RequestContext::run(scope_for(&editor), async {
        client.send("updateWidget", &json!({ "id": "w1" })).await.unwrap()
    })
    .await;
    assert_eq!(reply["updated"], true);
}

#[tokio::test]
async fn test_rpc_path_trusts_forwarded_credential_without_verifying() {
    let bus = bus_with_downstream();
    let client = ForwardingClient::new(bus.client("downstream"));
    let foreign = JwtIssuer::from_rsa_pem(FOREIGN_PRIVATE_KEY)
        .unwrap()
        .issue("u7", &["Viewer"])
        .unwrap();

    let reply: Value = RequestContext::run(scope_for(&foreign), async {
        client.send("whoami", &()).await.unwrap()
    })
    .await;

    assert_eq!(reply["subject_id"], "u7");
}

#[tokio::test]
async fn test_second_hop_forwards_original_caller() {
    let bus = bus_with_downstream();

    // Middle service: forwards onward while serving a message
    let onward = ForwardingClient::new(bus.client("downstream"));
    let middle = handler_fn(move |_envelope: MessageEnvelope| {
        let onward = onward.clone();
        async move {
            let seen = current_credential().map(|c| c.token().to_string());
            let reply: Value = onward
                .send("whoami", &())
                .await
                .map_err(|e| RpcError::new("UPSTREAM", e.status_code(), e.to_string()))?;
            Ok::<_, RpcError>(json!({ "seen": seen, "downstream": reply }))
        }
    });
    bus.bind(
        "middle",
        Arc::new(InboundCredentialLayer::new(middle, verifier(), factory())),
    );

    let client = ForwardingClient::new(bus.client("middle"));
    let token = token_for("u1", &["Viewer"]);
    let reply: Value = RequestContext::run(scope_for(&token), async {
        client.send("anything", &()).await.unwrap()
    })
    .await;

    assert_eq!(reply["seen"], token.as_str());
    assert_eq!(reply["downstream"]["subject_id"], "u1");
}

#[tokio::test]
async fn test_undecodable_credential_is_not_forwarded() {
    let bus = LocalBus::new();
    bus.bind(
        "recorder",
        Arc::new(handler_fn(|envelope: MessageEnvelope| async move {
            Ok::<_, RpcError>(json!({ "header": envelope.authorization() }))
        })),
    );

    let onward = ForwardingClient::new(bus.client("recorder"));
    let middle = handler_fn(move |_envelope: MessageEnvelope| {
        let onward = onward.clone();
        async move {
            let seen = current_credential().map(|c| c.token().to_string());
            let reply: Value = onward
                .send("record", &())
                .await
                .map_err(|e| RpcError::new("UPSTREAM", e.status_code(), e.to_string()))?;
            Ok::<_, RpcError>(json!({ "seen": seen, "downstream": reply }))
        }
    });
    bus.bind(
        "middle",
        Arc::new(InboundCredentialLayer::new(middle, verifier(), factory())),
    );

    let envelope = MessageEnvelope::new(Pattern::cmd("anything"), Value::Null)
        .with_header(AUTHORIZATION_HEADER, "Bearer not-a-token");
    let reply = bus.client("middle").request(envelope).await.unwrap();

    assert_eq!(reply["seen"], Value::Null);
    assert_eq!(reply["downstream"]["header"], Value::Null);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_keep_their_own_identity() {
    let bus = bus_with_downstream();
    let client = ForwardingClient::new(bus.client("downstream"));

    let mut tasks = Vec::new();
    for n in 0..32 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let subject = format!("user-{n}");
            let token = token_for(&subject, &["Viewer"]);
            let reply: Value = RequestContext::run(scope_for(&token), async {
                client.send("whoami", &()).await.unwrap()
            })
            .await;
            assert_eq!(reply["subject_id"], subject.as_str());
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}
