//! RS256 credential primitives shared by Nova services

pub mod jwt;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use jwt::{
    decode_unverified, strip_bearer, Claims, JwtError, JwtIssuer, JwtVerifier,
    ValidationSettings, BEARER_PREFIX,
};
