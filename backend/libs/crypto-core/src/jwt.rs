/// RS256 credential handling for Nova services
///
/// Two read paths exist:
///
/// - [`JwtVerifier::verify`] checks signature, expiry and (when configured)
///   issuer and audience. Every externally facing transport uses it.
/// - [`decode_unverified`] only parses the payload. It exists for the
///   internal queue path, where the sender already verified the credential.
///
/// ## Security Design
///
/// - **RS256 ONLY**: No symmetric algorithms (HS256) to prevent confusion attacks
/// - **No hardcoded keys**: Keys are passed in by the caller, usually from env
/// - **Immutable**: Verifiers and issuers are built once at startup and shared
///
/// ## Usage
///
/// ```rust,ignore
/// use crypto_core::jwt::{JwtVerifier, ValidationSettings};
///
/// let public_key = std::env::var("JWT_PUBLIC_KEY_PEM")?;
/// let verifier = JwtVerifier::from_rsa_pem(&public_key, &ValidationSettings::default())?;
/// let claims = verifier.verify(token)?;
/// ```
use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Scheme prefix used in `Authorization` headers
pub const BEARER_PREFIX: &str = "Bearer ";

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// JWT algorithm - MUST be RS256 for all Nova services
const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

// ============================================================================
// Data Structures
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Role names granted to the subject
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp); 0 when absent
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp). [`JwtVerifier`] rejects tokens
    /// without it; [`decode_unverified`] reads them as 0.
    #[serde(default)]
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Optional issuer / audience constraints applied by [`JwtVerifier`]
#[derive(Debug, Clone, Default)]
pub struct ValidationSettings {
    pub issuer: Option<String>,
    pub audience: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("invalid RSA key: {0}")]
    InvalidKey(String),

    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => JwtError::InvalidSignature,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            ErrorKind::InvalidAudience => JwtError::InvalidAudience,
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                JwtError::InvalidKey(err.to_string())
            }
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// Strip the `Bearer ` scheme from an `Authorization` header value
///
/// Returns `None` when the scheme is missing or the token is empty.
pub fn strip_bearer(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    let scheme = value.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Token Validation
// ============================================================================

/// Verifies RS256 tokens against a public key
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier from a PEM-encoded RSA public key
    ///
    /// ## Errors
    ///
    /// Returns [`JwtError::InvalidKey`] if the PEM is not a valid RSA key.
    pub fn from_rsa_pem(public_key_pem: &str, settings: &ValidationSettings) -> Result<Self, JwtError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        if settings.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&settings.audience);
        }

        Ok(Self { key, validation })
    }

    /// Validate signature and claims, returning the decoded claims
    ///
    /// `token` must not carry the `Bearer ` prefix.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("issuer", &self.validation.iss)
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

/// Parse claims without checking signature, expiry or audience
///
/// Only for credentials that already passed [`JwtVerifier::verify`] upstream.
/// Returns `None` for anything that is not a structurally valid JWT.
pub fn decode_unverified(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

// ============================================================================
// Token Generation
// ============================================================================

/// Mints RS256 tokens
///
/// Used by internal tooling and tests. Production tokens come from the
/// identity provider.
#[derive(Clone)]
pub struct JwtIssuer {
    key: EncodingKey,
    issuer: Option<String>,
    audience: Option<String>,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn from_rsa_pem(private_key_pem: &str) -> Result<Self, JwtError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key,
            issuer: None,
            audience: None,
            ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token for `subject` expiring after the configured TTL
    pub fn issue<S: AsRef<str>>(&self, subject: &str, roles: &[S]) -> Result<String, JwtError> {
        let exp = (Utc::now() + self.ttl).timestamp();
        self.issue_with_expiry(subject, roles, exp)
    }

    /// Issue a token with an explicit `exp` (Unix timestamp)
    pub fn issue_with_expiry<S: AsRef<str>>(
        &self,
        subject: &str,
        roles: &[S],
        exp: i64,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            sub: subject.to_string(),
            roles: roles.iter().map(|r| r.as_ref().to_string()).collect(),
            iat: Utc::now().timestamp(),
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(JWT_ALGORITHM), claims, &self.key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
