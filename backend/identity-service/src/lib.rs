/// Identity Service Library
///
/// Serves account and permission queries for the rest of Nova over the
/// identity queue. Callers are identified by the bearer credential the
/// gateway forwards with every message.
///
/// ## Modules
///
/// - `abilities`: Permission rules of this service
/// - `config`: Service configuration
/// - `directory`: Users seen by this service
/// - `error`: Error types
/// - `handlers`: Queue RPC handlers (`accountInfo`, `abilityRules`, `findUser`)
/// - `models`: Request and reply payloads
pub mod abilities;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use access_control::{AuthGuard, Authenticator, CredentialVerifier};
use jwt_propagation::InboundCredentialLayer;
use message_queue::Router;

// Re-export commonly used types
pub use abilities::identity_abilities;
pub use directory::UserDirectory;
pub use error::{IdentityError, Result};
pub use handlers::IdentityHandlers;

/// The identity queue consumer, ready to bind to a transport
pub fn consumer(
    verifier: Arc<dyn CredentialVerifier>,
    directory: UserDirectory,
) -> InboundCredentialLayer<Router> {
    let factory = Arc::new(identity_abilities());
    let guard = Arc::new(AuthGuard::new(
        Authenticator::new(Arc::clone(&verifier)),
        factory.clone(),
    ));

    let router = IdentityHandlers::new(guard, directory).router();
    InboundCredentialLayer::new(router, verifier, factory)
}
