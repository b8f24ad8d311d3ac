//! Gateway error type and the RPC exception filter
//!
//! Errors returned by a backend service travel back as [`RpcError`]
//! payloads. The gateway relays them unchanged: a 403 from the identity
//! service is a 403 to the client, with the same code and message.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use async_graphql::ErrorExtensions;
use error_types::{error_codes, AuthError, RpcError};
use jwt_propagation::ForwardError;
use message_queue::QueueError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upstream(#[from] ForwardError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl GatewayError {
    /// The payload sent to the client
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            GatewayError::Auth(err) => err.to_rpc_error(),
            GatewayError::BadRequest(msg) => RpcError::bad_request(msg.clone()),
            GatewayError::Upstream(err) => upstream_payload(err),
        }
    }

    pub fn to_graphql_error(&self) -> async_graphql::Error {
        let RpcError {
            response,
            status,
            message,
            ..
        } = self.to_rpc_error();
        async_graphql::Error::new(message).extend_with(move |_, extensions| {
            extensions.set("code", response);
            extensions.set("status", i32::from(status));
        })
    }
}

fn upstream_payload(err: &ForwardError) -> RpcError {
    match err {
        ForwardError::Remote(remote) => {
            if !remote.is_rpc_exception() {
                warn!(name = %remote.name, "Upstream replied with a non-RPC error payload");
            }
            remote.clone()
        }
        ForwardError::Transport(QueueError::Timeout(after)) => {
            error!(timeout = ?after, "Upstream call timed out");
            RpcError::new(error_codes::GATEWAY_TIMEOUT, 504, "Upstream service timed out")
        }
        ForwardError::Transport(cause) => {
            error!(error = %cause, "Upstream call failed");
            RpcError::new(error_codes::BAD_GATEWAY, 502, "Upstream service unavailable")
        }
        ForwardError::Encode(cause) | ForwardError::Decode(cause) => {
            error!(error = %cause, "Upstream payload mismatch");
            RpcError::internal("Internal server error")
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.to_rpc_error().status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let payload = self.to_rpc_error();
        HttpResponse::build(self.status_code()).json(json!({
            "error": payload.response,
            "message": payload.message,
            "status": payload.status,
        }))
    }
}
