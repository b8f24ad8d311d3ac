use async_trait::async_trait;
use crypto_core::{decode_unverified, JwtError, JwtVerifier, ValidationSettings};
use error_types::AuthError;
use tracing::debug;

use crate::identity::{Credential, Identity};

/// Turns a bearer credential into an [`Identity`]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Full check: signature, expiry and configured issuer/audience.
    /// Fails with [`AuthError::InvalidCredential`].
    async fn verify(&self, credential: &Credential) -> Result<Identity, AuthError>;

    /// Claims extraction WITHOUT any verification.
    ///
    /// Internal-trust relaxation: only for queue messages, whose producer is
    /// a trusted internal service that forwarded a credential it verified
    /// itself. This is not a security check and must never gate an external
    /// request. `None` for anything that does not parse.
    fn decode(&self, credential: &Credential) -> Option<Identity>;
}

/// RS256 JWT verifier
#[derive(Debug, Clone)]
pub struct JwtCredentialVerifier {
    verifier: JwtVerifier,
}

impl JwtCredentialVerifier {
    pub fn new(verifier: JwtVerifier) -> Self {
        Self { verifier }
    }

    pub fn from_rsa_pem(public_key_pem: &str, settings: &ValidationSettings) -> Result<Self, JwtError> {
        JwtVerifier::from_rsa_pem(public_key_pem, settings).map(Self::new)
    }
}

#[async_trait]
impl CredentialVerifier for JwtCredentialVerifier {
    async fn verify(&self, credential: &Credential) -> Result<Identity, AuthError> {
        self.verifier
            .verify(credential.token())
            .map(|claims| Identity::from_claims(&claims))
            .map_err(|e| {
                debug!(error = %e, "Credential verification failed");
                AuthError::InvalidCredential(e.to_string())
            })
    }

    fn decode(&self, credential: &Credential) -> Option<Identity> {
        decode_unverified(credential.token()).map(|claims| Identity::from_claims(&claims))
    }
}
