//! In-process queue transport
//!
//! Named queues backed by tokio mpsc channels with oneshot replies. Used for
//! single-binary deployments and for exercising services end to end in tests
//! without a broker. Each delivery is handled on its own task, so a handler
//! never runs inside the sender's request scope.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use error_types::RpcError;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::envelope::MessageEnvelope;
use crate::transport::{MessageHandler, MessageTransport};
use crate::QueueError;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

type Reply = oneshot::Sender<Result<Value, RpcError>>;

struct Delivery {
    envelope: MessageEnvelope,
    reply: Option<Reply>,
}

/// Registry of in-process queues
#[derive(Clone)]
pub struct LocalBus {
    queues: Arc<DashMap<String, mpsc::Sender<Delivery>>>,
    capacity: usize,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Start consuming `queue` with `handler`
    ///
    /// Binding the same queue again replaces the previous consumer.
    /// Must be called from within a tokio runtime.
    pub fn bind(&self, queue: &str, handler: Arc<dyn MessageHandler>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<Delivery>(self.capacity);
        self.queues.insert(queue.to_string(), tx);

        let queue_name = queue.to_string();
        info!(queue = %queue_name, "Local queue consumer started");

        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                let handler = Arc::clone(&handler);
                let queue_name = queue_name.clone();

                tokio::spawn(async move {
                    let Delivery { envelope, reply } = delivery;
                    let pattern = envelope.pattern.clone();
                    let result = handler.handle(envelope).await;

                    match reply {
                        Some(reply) => {
                            if reply.send(result).is_err() {
                                debug!(queue = %queue_name, %pattern, "Requester went away before reply");
                            }
                        }
                        None => {
                            if let Err(err) = result {
                                warn!(queue = %queue_name, %pattern, error = %err, "Event handler failed");
                            }
                        }
                    }
                });
            }
            debug!(queue = %queue_name, "Local queue consumer stopped");
        })
    }

    /// Stop accepting messages for `queue`
    pub fn unbind(&self, queue: &str) -> bool {
        self.queues.remove(queue).is_some()
    }

    pub fn client(&self, queue: &str) -> LocalClient {
        LocalClient {
            bus: self.clone(),
            queue: queue.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    fn sender(&self, queue: &str) -> Result<mpsc::Sender<Delivery>, QueueError> {
        self.queues
            .get(queue)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| QueueError::NoConsumer(queue.to_string()))
    }
}

/// Producer handle for one named queue
#[derive(Clone)]
pub struct LocalClient {
    bus: LocalBus,
    queue: String,
    timeout: Duration,
}

impl LocalClient {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    async fn deliver(&self, delivery: Delivery) -> Result<(), QueueError> {
        self.bus
            .sender(&self.queue)?
            .send(delivery)
            .await
            .map_err(|_| QueueError::Closed(self.queue.clone()))
    }
}

#[async_trait]
impl MessageTransport for LocalClient {
    async fn request(&self, envelope: MessageEnvelope) -> Result<Value, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.deliver(Delivery {
            envelope,
            reply: Some(tx),
        })
        .await?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result.map_err(QueueError::Remote),
            Ok(Err(_)) => Err(QueueError::Closed(self.queue.clone())),
            Err(_) => Err(QueueError::Timeout(self.timeout)),
        }
    }

    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), QueueError> {
        self.deliver(Delivery {
            envelope,
            reply: None,
        })
        .await
    }
}
