//! Identity queue handlers, driven the way the gateway drives them:
//! envelopes carrying `Authorization: Bearer <token>` through the inbound
//! credential layer.

use std::sync::Arc;

use access_control::{Action, JwtCredentialVerifier};
use crypto_core::test_utils::{test_verifier, token_for};
use identity_service::models::{patterns, AbilityRules, AccountInfo, UserView};
use identity_service::{consumer, UserDirectory};
use message_queue::{MessageEnvelope, MessageHandler, Pattern, RpcError, AUTHORIZATION_HEADER};
use serde_json::{json, Value};

fn service(directory: &UserDirectory) -> impl MessageHandler {
    consumer(
        Arc::new(JwtCredentialVerifier::new(test_verifier())),
        directory.clone(),
    )
}

fn message(cmd: &str, data: Value, token: Option<&str>) -> MessageEnvelope {
    let envelope = MessageEnvelope::new(Pattern::cmd(cmd), data);
    match token {
        Some(token) => envelope.with_header(AUTHORIZATION_HEADER, format!("Bearer {token}")),
        None => envelope,
    }
}

#[tokio::test]
async fn test_account_info_records_caller() {
    let directory = UserDirectory::new();
    let service = service(&directory);
    let token = token_for("u1", &["Support"]);

    let reply = service
        .handle(message(patterns::ACCOUNT_INFO, Value::Null, Some(&token)))
        .await
        .unwrap();
    let account: AccountInfo = serde_json::from_value(reply).unwrap();

    assert_eq!(account.id, "u1");
    assert_eq!(account.roles, vec!["Support".to_string()]);
    assert!(!account.ability.unrestricted);
    assert!(account
        .ability
        .rules
        .iter()
        .any(|rule| rule.action == Action::Read && rule.conditions.is_none()));
    assert!(directory.get("u1").is_some());
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let directory = UserDirectory::new();
    let service = service(&directory);

    let err: RpcError = service
        .handle(message(patterns::ACCOUNT_INFO, Value::Null, None))
        .await
        .unwrap_err();

    assert_eq!(err.status, 401);
    assert_eq!(err.response, "UNAUTHORIZED");
    assert!(directory.is_empty());
}

#[tokio::test]
async fn test_ability_rules_bind_subject_id() {
    let directory = UserDirectory::new();
    let service = service(&directory);
    let token = token_for("u42", &Vec::<String>::new());

    let reply = service
        .handle(message(patterns::ABILITY_RULES, Value::Null, Some(&token)))
        .await
        .unwrap();
    let rules: AbilityRules = serde_json::from_value(reply).unwrap();

    let conditions = rules.rules[0].conditions.as_ref().unwrap();
    assert_eq!(conditions["id"], "u42");
}

#[tokio::test]
async fn test_superuser_rules_are_unrestricted() {
    let directory = UserDirectory::new();
    let service = service(&directory);
    let token = token_for("root", &["Super"]);

    let reply = service
        .handle(message(patterns::ABILITY_RULES, Value::Null, Some(&token)))
        .await
        .unwrap();
    let rules: AbilityRules = serde_json::from_value(reply).unwrap();
    assert!(rules.unrestricted);
}

#[tokio::test]
async fn test_find_user_checks_the_record() {
    let directory = UserDirectory::new();
    directory.record_seen("u1", &[]);
    directory.record_seen("u2", &[]);
    let service = service(&directory);

    // Own record
    let own = token_for("u1", &Vec::<String>::new());
    let reply = service
        .handle(message(patterns::FIND_USER, json!({ "id": "u1" }), Some(&own)))
        .await
        .unwrap();
    let user: UserView = serde_json::from_value(reply).unwrap();
    assert_eq!(user.id, "u1");

    // Somebody else's record
    let err = service
        .handle(message(patterns::FIND_USER, json!({ "id": "u2" }), Some(&own)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 403);
    assert_eq!(err.response, "FORBIDDEN");
}

#[tokio::test]
async fn test_denied_caller_cannot_tell_unknown_ids() {
    let directory = UserDirectory::new();
    let service = service(&directory);
    let token = token_for("u1", &Vec::<String>::new());

    let err = service
        .handle(message(patterns::FIND_USER, json!({ "id": "ghost" }), Some(&token)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 403);
}

#[tokio::test]
async fn test_support_finds_anyone_and_gets_not_found() {
    let directory = UserDirectory::new();
    directory.record_seen("u2", &["Viewer".to_string()]);
    let service = service(&directory);
    let token = token_for("s1", &["Support"]);

    let reply = service
        .handle(message(patterns::FIND_USER, json!({ "id": "u2" }), Some(&token)))
        .await
        .unwrap();
    assert_eq!(reply["roles"], json!(["Viewer"]));

    let err = service
        .handle(message(patterns::FIND_USER, json!({ "id": "ghost" }), Some(&token)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.response, "NOT_FOUND");
}

#[tokio::test]
async fn test_bad_payload_is_bad_request() {
    let directory = UserDirectory::new();
    let service = service(&directory);
    let token = token_for("s1", &["Support"]);

    let err = service
        .handle(message(patterns::FIND_USER, json!({ "name": "u2" }), Some(&token)))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
}

#[tokio::test]
async fn test_unknown_pattern() {
    let directory = UserDirectory::new();
    let service = service(&directory);

    let err = service
        .handle(message("deleteEverything", Value::Null, None))
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.response, "PATTERN_NOT_FOUND");
}
