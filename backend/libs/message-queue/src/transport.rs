use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use error_types::{error_codes, RpcError};
use serde_json::Value;
use tracing::warn;

use crate::envelope::MessageEnvelope;
use crate::QueueError;

/// Sending side of a queue
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Request/reply. A handler failure comes back as [`QueueError::Remote`].
    async fn request(&self, envelope: MessageEnvelope) -> Result<Value, QueueError>;

    /// Fire-and-forget event
    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), QueueError>;
}

#[async_trait]
impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    async fn request(&self, envelope: MessageEnvelope) -> Result<Value, QueueError> {
        (**self).request(envelope).await
    }

    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), QueueError> {
        (**self).publish(envelope).await
    }
}

/// Receiving side of a queue
///
/// For events the returned value is discarded.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: MessageEnvelope) -> Result<Value, RpcError>;
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    async fn handle(&self, envelope: MessageEnvelope) -> Result<Value, RpcError> {
        (**self).handle(envelope).await
    }
}

/// Adapter turning an async closure into a [`MessageHandler`]
pub struct HandlerFn<F>(F);

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(MessageEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(MessageEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send,
{
    async fn handle(&self, envelope: MessageEnvelope) -> Result<Value, RpcError> {
        (self.0)(envelope).await
    }
}

/// Dispatches messages to handlers by `pattern.cmd`
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<String, Arc<dyn MessageHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, cmd: impl Into<String>, handler: impl MessageHandler) -> Self {
        self.routes.insert(cmd.into(), Arc::new(handler));
        self
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

#[async_trait]
impl MessageHandler for Router {
    async fn handle(&self, envelope: MessageEnvelope) -> Result<Value, RpcError> {
        match self.routes.get(&envelope.pattern.cmd) {
            Some(handler) => handler.handle(envelope).await,
            None => {
                warn!(pattern = %envelope.pattern, "No handler registered for pattern");
                Err(RpcError::new(
                    error_codes::PATTERN_NOT_FOUND,
                    404,
                    format!("No handler for pattern {}", envelope.pattern),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Pattern;
    use serde_json::json;

    #[tokio::test]
    async fn test_router_dispatches_by_cmd() {
        let router = Router::new()
            .route("ping", handler_fn(|_| async { Ok::<_, RpcError>(json!("pong")) }))
            .route(
                "echo",
                handler_fn(|envelope: MessageEnvelope| async move { Ok::<_, RpcError>(envelope.data) }),
            );

        let ping = MessageEnvelope::new(Pattern::cmd("ping"), Value::Null);
        assert_eq!(router.handle(ping).await.unwrap(), json!("pong"));

        let echo = MessageEnvelope::new(Pattern::cmd("echo"), json!({ "n": 1 }));
        assert_eq!(router.handle(echo).await.unwrap(), json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn test_router_unknown_pattern() {
        let router = Router::new();
        let envelope = MessageEnvelope::new(Pattern::cmd("nope"), Value::Null);

        let err = router.handle(envelope).await.unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.response, error_codes::PATTERN_NOT_FOUND);
    }
}
