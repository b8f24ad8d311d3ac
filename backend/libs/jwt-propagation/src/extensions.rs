//! Envelope helpers for the forwarded credential

use access_control::Credential;
use message_queue::{MessageEnvelope, AUTHORIZATION_HEADER};

/// Read and write the `Authorization` header of a queue message
///
/// The header always carries the wire form `Bearer <token>`; the
/// [`Credential`] side never includes the scheme.
pub trait EnvelopeCredentialExt: Sized {
    /// The bearer credential carried by the message, if well formed
    fn bearer_credential(&self) -> Option<Credential>;

    /// Set the `Authorization` header, replacing any previous value
    fn attach_credential(self, credential: &Credential) -> Self;
}

impl EnvelopeCredentialExt for MessageEnvelope {
    fn bearer_credential(&self) -> Option<Credential> {
        self.authorization()
            .and_then(Credential::from_authorization_header)
    }

    fn attach_credential(mut self, credential: &Credential) -> Self {
        self.headers
            .retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
        self.with_header(AUTHORIZATION_HEADER, credential.to_header_value())
    }
}
