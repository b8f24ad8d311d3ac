/// GET /api/v1/users/{id}
/// GET /api/v1/admin/users/{id}
///
/// Both forward `findUser`; the identity service applies the per-record
/// check against the caller's own rules.
use actix_web::{web, HttpResponse};
use tracing::info;

use crate::clients::ServiceClients;
use crate::error::GatewayError;

pub async fn get_user(
    clients: web::Data<ServiceClients>,
    path: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let id = path.into_inner();
    info!(user_id = %id, "GET user");

    let user = clients.find_user(&id).await?;
    Ok(HttpResponse::Ok().json(user))
}
