//! Fixed RSA key pairs for tests. NEVER use these keys in production.

use crate::jwt::{JwtIssuer, JwtVerifier, ValidationSettings};

pub const TEST_PRIVATE_KEY: &str = include_str!("test_keys/private_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("test_keys/public_key.pem");

/// Second pair, used to produce correctly shaped tokens the verifier must reject
pub const FOREIGN_PRIVATE_KEY: &str = include_str!("test_keys/foreign_private_key.pem");
pub const FOREIGN_PUBLIC_KEY: &str = include_str!("test_keys/foreign_public_key.pem");

pub fn test_issuer() -> JwtIssuer {
    JwtIssuer::from_rsa_pem(TEST_PRIVATE_KEY).expect("test private key must parse")
}

pub fn test_verifier() -> JwtVerifier {
    JwtVerifier::from_rsa_pem(TEST_PUBLIC_KEY, &ValidationSettings::default())
        .expect("test public key must parse")
}

/// Token signed by the test key, valid for one hour
pub fn token_for<S: AsRef<str>>(subject: &str, roles: &[S]) -> String {
    test_issuer()
        .issue(subject, roles)
        .expect("signing with test key must succeed")
}
