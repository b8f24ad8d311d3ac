//! Kafka-backed queue transport
//!
//! Requests go to a request topic as JSON envelopes. The forwarded credential,
//! the correlation id and the reply topic are duplicated into Kafka headers so
//! brokers and tooling can see them without decoding the payload. Replies are
//! matched to pending requests by correlation id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use error_types::RpcError;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::envelope::{MessageEnvelope, AUTHORIZATION_HEADER};
use crate::transport::{MessageHandler, MessageTransport};
use crate::QueueError;

pub const CORRELATION_ID_HEADER: &str = "correlation-id";
pub const REPLY_TO_HEADER: &str = "reply-to";

/// Kafka configuration
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    pub request_timeout: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "nova".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Reply written to the requester's reply topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<RpcError>,
}

fn producer(config: &KafkaConfig) -> Result<FutureProducer, QueueError> {
    ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("message.timeout.ms", "30000")
        .set("enable.idempotence", "true")
        .set("acks", "all")
        .create::<FutureProducer>()
        .map_err(|e| QueueError::Producer(e.to_string()))
}

fn consumer(config: &KafkaConfig, group_id: &str, topic: &str) -> Result<StreamConsumer, QueueError> {
    let consumer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "latest")
        .create::<StreamConsumer>()
        .map_err(|e| QueueError::Consumer(e.to_string()))?;

    consumer
        .subscribe(&[topic])
        .map_err(|e| QueueError::Consumer(e.to_string()))?;
    Ok(consumer)
}

fn envelope_headers(envelope: &MessageEnvelope) -> OwnedHeaders {
    let id = envelope.id.to_string();
    let mut headers = OwnedHeaders::new().insert(Header {
        key: CORRELATION_ID_HEADER,
        value: Some(id.as_str()),
    });
    if let Some(authorization) = envelope.authorization() {
        headers = headers.insert(Header {
            key: AUTHORIZATION_HEADER,
            value: Some(authorization),
        });
    }
    if let Some(reply_to) = envelope.reply_to.as_deref() {
        headers = headers.insert(Header {
            key: REPLY_TO_HEADER,
            value: Some(reply_to),
        });
    }
    headers
}

/// Decode an envelope, merging Kafka headers the payload does not already carry
fn decode_envelope<M: Message>(message: &M) -> Result<MessageEnvelope, QueueError> {
    let payload = message
        .payload()
        .ok_or_else(|| QueueError::Serialization("empty payload".to_string()))?;
    let mut envelope: MessageEnvelope =
        serde_json::from_slice(payload).map_err(|e| QueueError::Serialization(e.to_string()))?;

    if let Some(headers) = message.headers() {
        for header in headers.iter() {
            let Some(value) = header.value.and_then(|v| std::str::from_utf8(v).ok()) else {
                continue;
            };
            if header.key == REPLY_TO_HEADER && envelope.reply_to.is_none() {
                envelope.reply_to = Some(value.to_string());
            } else if header.key != CORRELATION_ID_HEADER && !envelope.has_header(header.key) {
                envelope.headers.insert(header.key.to_string(), value.to_string());
            }
        }
    }
    Ok(envelope)
}

/// Client side: produces requests and waits for correlated replies
pub struct KafkaTransport {
    producer: FutureProducer,
    topic: String,
    reply_topic: String,
    pending: Arc<DashMap<Uuid, oneshot::Sender<Result<Value, RpcError>>>>,
    timeout: Duration,
}

impl KafkaTransport {
    /// Connect and start listening on `reply_topic`
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &KafkaConfig, topic: &str, reply_topic: &str) -> Result<Self, QueueError> {
        let producer = producer(config)?;
        // Every instance needs its own replies, so the group is per process.
        let group = format!("{}-replies-{}", config.group_id, Uuid::new_v4());
        let replies = consumer(config, &group, reply_topic)?;
        let pending: Arc<DashMap<Uuid, oneshot::Sender<Result<Value, RpcError>>>> =
            Arc::new(DashMap::new());

        let listener_pending = Arc::clone(&pending);
        let listener_topic = reply_topic.to_string();
        tokio::spawn(async move {
            loop {
                match replies.recv().await {
                    Ok(message) => {
                        let reply = message
                            .payload()
                            .and_then(|p| serde_json::from_slice::<ReplyMessage>(p).ok());
                        let Some(reply) = reply else {
                            warn!(topic = %listener_topic, "Discarding undecodable reply");
                            continue;
                        };
                        if let Some((_, waiter)) = listener_pending.remove(&reply.id) {
                            let result = match reply.err {
                                Some(err) => Err(err),
                                None => Ok(reply.response.unwrap_or(Value::Null)),
                            };
                            let _ = waiter.send(result);
                        }
                    }
                    Err(e) => error!(topic = %listener_topic, error = %e, "Reply consumer error"),
                }
            }
        });

        info!(topic = %topic, reply_topic = %reply_topic, "Kafka transport connected");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            reply_topic: reply_topic.to_string(),
            pending,
            timeout: config.request_timeout,
        })
    }

    async fn produce(&self, envelope: &MessageEnvelope) -> Result<(), QueueError> {
        let payload =
            serde_json::to_vec(envelope).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let key = envelope.id.to_string();
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(&key)
            .headers(envelope_headers(envelope));

        self.producer
            .send(record, Duration::from_secs(30))
            .await
            .map(|_| ())
            .map_err(|(err, _)| QueueError::Producer(err.to_string()))
    }
}

#[async_trait]
impl MessageTransport for KafkaTransport {
    async fn request(&self, envelope: MessageEnvelope) -> Result<Value, QueueError> {
        let envelope = envelope.with_reply_to(self.reply_topic.clone());
        let id = envelope.id;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if let Err(e) = self.produce(&envelope).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result.map_err(QueueError::Remote),
            Ok(Err(_)) => Err(QueueError::Closed(self.topic.clone())),
            Err(_) => {
                self.pending.remove(&id);
                Err(QueueError::Timeout(self.timeout))
            }
        }
    }

    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), QueueError> {
        self.produce(&envelope).await
    }
}

/// Server side: consumes a request topic and replies to `reply-to`
pub struct KafkaServer {
    consumer: StreamConsumer,
    producer: FutureProducer,
    topic: String,
    handler: Arc<dyn MessageHandler>,
}

impl KafkaServer {
    pub fn new(
        config: &KafkaConfig,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            consumer: consumer(config, &config.group_id, topic)?,
            producer: producer(config)?,
            topic: topic.to_string(),
            handler,
        })
    }

    /// Consume until the stream fails
    pub async fn run(self) -> Result<(), QueueError> {
        info!(topic = %self.topic, "Kafka server consuming");

        loop {
            let message = self
                .consumer
                .recv()
                .await
                .map_err(|e| QueueError::Consumer(e.to_string()))?;

            let envelope = match decode_envelope(&message) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "Discarding malformed message");
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            let producer = self.producer.clone();
            tokio::spawn(async move {
                let id = envelope.id;
                let reply_to = envelope.reply_to.clone();
                let result = handler.handle(envelope).await;

                let Some(reply_to) = reply_to else {
                    if let Err(err) = result {
                        warn!(error = %err, "Event handler failed");
                    }
                    return;
                };

                let reply = match result {
                    Ok(response) => ReplyMessage { id, response: Some(response), err: None },
                    Err(err) => ReplyMessage { id, response: None, err: Some(err) },
                };
                let payload = match serde_json::to_vec(&reply) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(error = %e, "Failed to encode reply");
                        return;
                    }
                };
                let key = id.to_string();
                let record = FutureRecord::to(&reply_to).payload(&payload).key(&key);
                match producer.send(record, Duration::from_secs(30)).await {
                    Ok(_) => debug!(reply_to = %reply_to, "Reply sent"),
                    Err((e, _)) => error!(reply_to = %reply_to, error = %e, "Failed to send reply"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Pattern;
    use rdkafka::message::OwnedMessage;
    use rdkafka::Timestamp;

    #[test]
    fn test_kafka_config_default() {
        let config = KafkaConfig::default();
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_header_merge_prefers_payload() {
        let envelope = MessageEnvelope::new(Pattern::cmd("accountInfo"), Value::Null);
        let payload = serde_json::to_vec(&envelope).unwrap();
        let headers = OwnedHeaders::new()
            .insert(Header { key: AUTHORIZATION_HEADER, value: Some("Bearer from-kafka") })
            .insert(Header { key: REPLY_TO_HEADER, value: Some("gateway.replies") });

        let message = OwnedMessage::new(
            Some(payload),
            None,
            "identity".to_string(),
            Timestamp::NotAvailable,
            0,
            0,
            Some(headers),
        );

        let decoded = decode_envelope(&message).unwrap();
        assert_eq!(decoded.authorization(), Some("Bearer from-kafka"));
        assert_eq!(decoded.reply_to.as_deref(), Some("gateway.replies"));
    }
}
