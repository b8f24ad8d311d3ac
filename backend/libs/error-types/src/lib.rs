//! Authorization error taxonomy shared by every Nova service
//!
//! The same four failure kinds surface on every transport: HTTP maps them to
//! a status code, GraphQL to error extensions, and queue RPC replies carry
//! them inside an [`RpcError`] payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for authorization code paths
pub type Result<T> = std::result::Result<T, AuthError>;

/// Stable error codes sent to clients
pub mod error_codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INVALID_CREDENTIAL: &str = "INVALID_CREDENTIAL";
    pub const UNSUPPORTED_TRANSPORT: &str = "UNSUPPORTED_TRANSPORT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const PATTERN_NOT_FOUND: &str = "PATTERN_NOT_FOUND";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const BAD_GATEWAY: &str = "BAD_GATEWAY";
    pub const GATEWAY_TIMEOUT: &str = "GATEWAY_TIMEOUT";
}

/// Authentication / authorization failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "details")]
pub enum AuthError {
    /// Missing or unusable credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid identity that failed a policy or role check
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Signature or expiry check failed
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Guard invoked with an execution context it cannot read. Programming error.
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Ability factory or infrastructure failure. Never a denial.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated(_) => 401,
            Self::Forbidden(_) => 403,
            Self::InvalidCredential(_) => 401,
            Self::UnsupportedTransport(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Stable code carried in response bodies and RPC payloads
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => error_codes::UNAUTHORIZED,
            Self::Forbidden(_) => error_codes::FORBIDDEN,
            Self::InvalidCredential(_) => error_codes::INVALID_CREDENTIAL,
            Self::UnsupportedTransport(_) => error_codes::UNSUPPORTED_TRANSPORT,
            Self::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Message safe to return to a caller
    ///
    /// Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(_) | Self::InvalidCredential(_) => "Unauthorized".to_string(),
            Self::Forbidden(_) => "Forbidden".to_string(),
            Self::UnsupportedTransport(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// True for the two caller-facing denials
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_) | Self::Forbidden(_) | Self::InvalidCredential(_)
        )
    }

    /// Convert to the structured RPC error payload
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::new(self.code(), self.status_code(), self.public_message())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Error payload carried by queue RPC replies
///
/// Wire shape: `{ "response": "FORBIDDEN", "status": 403, "message": "Forbidden", "name": "RpcException" }`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{name} {status} {response}: {message}")]
pub struct RpcError {
    pub response: String,
    pub status: u16,
    pub message: String,
    pub name: String,
}

impl RpcError {
    pub const NAME: &'static str = "RpcException";

    pub fn new(response: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            status,
            message: message.into(),
            name: Self::NAME.to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(error_codes::NOT_FOUND, 404, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::BAD_REQUEST, 400, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, 500, message)
    }

    /// True when the payload was produced by an RPC handler
    pub fn is_rpc_exception(&self) -> bool {
        self.name == Self::NAME
    }

    /// Recover the authorization error kind, if this payload carries one
    pub fn auth_error(&self) -> Option<AuthError> {
        match self.response.as_str() {
            error_codes::UNAUTHORIZED => Some(AuthError::Unauthenticated(self.message.clone())),
            error_codes::FORBIDDEN => Some(AuthError::Forbidden(self.message.clone())),
            error_codes::INVALID_CREDENTIAL => {
                Some(AuthError::InvalidCredential(self.message.clone()))
            }
            _ => None,
        }
    }
}

impl From<AuthError> for RpcError {
    fn from(err: AuthError) -> Self {
        err.to_rpc_error()
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::bad_request(format!("Invalid payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::Unauthenticated("x".into()).status_code(), 401);
        assert_eq!(AuthError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(AuthError::InvalidCredential("x".into()).status_code(), 401);
        assert_eq!(AuthError::UnsupportedTransport("x".into()).status_code(), 500);
        assert_eq!(AuthError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_internal_is_not_a_denial() {
        assert!(AuthError::Forbidden("policy".into()).is_denial());
        assert!(!AuthError::Internal("factory exploded".into()).is_denial());
    }

    #[test]
    fn test_rpc_error_wire_shape() {
        let payload = AuthError::Forbidden("can(read, Widget)".into()).to_rpc_error();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["response"], "FORBIDDEN");
        assert_eq!(json["status"], 403);
        assert_eq!(json["message"], "Forbidden");
        assert_eq!(json["name"], "RpcException");
    }

    #[test]
    fn test_rpc_error_hides_internal_details() {
        let payload = AuthError::Internal("db password wrong".into()).to_rpc_error();
        assert_eq!(payload.status, 500);
        assert!(!payload.message.contains("password"));
    }

    #[test]
    fn test_rpc_error_recovers_auth_kind() {
        let payload = AuthError::Unauthenticated("missing".into()).to_rpc_error();
        assert!(matches!(
            payload.auth_error(),
            Some(AuthError::Unauthenticated(_))
        ));
        assert_eq!(RpcError::not_found("user").auth_error(), None);
    }
}
