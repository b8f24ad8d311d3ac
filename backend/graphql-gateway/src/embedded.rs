//! Single-binary deployment: backend services on the in-process bus

use std::sync::Arc;

use access_control::CredentialVerifier;
use identity_service::UserDirectory;
use message_queue::LocalBus;
use notification_service::Mailbox;
use tracing::info;

use crate::config::QueueConfig;

/// Bind the identity service and the notification worker to `bus`
///
/// Each consumer gets its own handle on the verifier; neither shares a
/// request scope with the gateway, since every delivery runs in its own task.
pub fn bind_services(
    bus: &LocalBus,
    queues: &QueueConfig,
    verifier: Arc<dyn CredentialVerifier>,
    directory: UserDirectory,
    mailbox: Arc<dyn Mailbox>,
) {
    bus.bind(
        &queues.identity_queue,
        Arc::new(identity_service::consumer(Arc::clone(&verifier), directory)),
    );
    bus.bind(
        &queues.notification_queue,
        Arc::new(notification_service::consumer(verifier, mailbox)),
    );
    info!(
        identity_queue = %queues.identity_queue,
        notification_queue = %queues.notification_queue,
        "Backend services embedded on the local bus"
    );
}
