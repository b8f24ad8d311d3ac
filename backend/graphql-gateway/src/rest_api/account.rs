/// Account API endpoints
///
/// GET /api/v1/status - Gateway status (public)
/// GET /api/v1/account - Caller's account, from the identity service
/// GET /api/v1/account/abilities - Caller's rules, from the identity service
/// GET /api/v1/session - Caller's identity and rules as seen by the gateway
use access_control::{current_credential, CurrentAbility, CurrentUser};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::clients::ServiceClients;
use crate::error::GatewayError;

pub async fn status() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "credentialPresented": current_credential().is_some(),
    }))
}

pub async fn account_info(
    clients: web::Data<ServiceClients>,
) -> Result<HttpResponse, GatewayError> {
    let account = clients.account_info().await?;
    info!(subject_id = %account.id, "GET /api/v1/account");
    Ok(HttpResponse::Ok().json(account))
}

pub async fn ability_rules(
    clients: web::Data<ServiceClients>,
) -> Result<HttpResponse, GatewayError> {
    let rules = clients.ability_rules().await?;
    Ok(HttpResponse::Ok().json(rules))
}

pub async fn session(
    CurrentUser(identity): CurrentUser,
    CurrentAbility(ability): CurrentAbility,
) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "subjectId": identity.subject_id(),
        "roles": identity.roles(),
        "unrestricted": ability.is_unrestricted(),
        "rules": ability.rules(),
    }))
}
