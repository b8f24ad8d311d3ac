use error_types::{AuthError, RpcError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Convert to the RPC error payload for the wire
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            IdentityError::UserNotFound(id) => RpcError::not_found(format!("User {id} not found")),
            IdentityError::InvalidRequest(msg) => RpcError::bad_request(msg.clone()),
            IdentityError::Auth(err) => err.to_rpc_error(),
            IdentityError::Internal(_) => {
                // Don't leak internal details
                RpcError::internal("Internal server error")
            }
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::InvalidRequest(err.to_string())
    }
}

impl From<IdentityError> for RpcError {
    fn from(err: IdentityError) -> Self {
        if let IdentityError::Internal(detail) = &err {
            tracing::error!(error = %detail, "Identity handler failed");
        }
        err.to_rpc_error()
    }
}
