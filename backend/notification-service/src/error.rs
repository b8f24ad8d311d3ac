use error_types::{AuthError, RpcError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::InvalidEvent(err.to_string())
    }
}

impl From<NotificationError> for RpcError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::InvalidEvent(msg) => RpcError::bad_request(msg),
            NotificationError::Auth(auth) => auth.to_rpc_error(),
            NotificationError::Delivery(detail) => {
                tracing::error!(error = %detail, "Notification delivery failed");
                RpcError::internal("Internal server error")
            }
        }
    }
}
