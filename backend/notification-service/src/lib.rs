pub mod abilities;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

use std::sync::Arc;

use access_control::{AuthGuard, Authenticator, CredentialVerifier};
use jwt_propagation::InboundCredentialLayer;
use message_queue::Router;

pub use config::Config;
pub use error::{NotificationError, Result};
pub use handlers::NotificationHandlers;
pub use models::{NotificationEvent, NotificationType};
pub use services::{LoggingMailbox, Mailbox, MemoryMailbox};

/// The notification queue consumer, ready to bind to a transport
pub fn consumer(
    verifier: Arc<dyn CredentialVerifier>,
    mailbox: Arc<dyn Mailbox>,
) -> InboundCredentialLayer<Router> {
    let factory = Arc::new(abilities::notification_abilities());
    let guard = Arc::new(AuthGuard::new(
        Authenticator::new(Arc::clone(&verifier)),
        factory.clone(),
    ));

    let router = NotificationHandlers::new(guard, mailbox).router();
    InboundCredentialLayer::new(router, verifier, factory)
}
