//! Signed session token issuance and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Claims carried by a session token. Identifier only: role and team data
/// are re-resolved from the store on every request, so a role change takes
/// effect on the holder's next request instead of at token expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user id.
    pub sub: i32,

    /// Issued-at, unix seconds.
    pub iat: i64,

    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("auth.token_secret is not configured")]
    MissingSecret,

    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256 session tokens. Holds the keys derived from
/// the server secret; constructed once at startup and shared read-only.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Build the service from config. A missing secret is a deployment
    /// error surfaced at startup, never a per-request condition.
    pub fn from_config(auth: &AuthConfig) -> Result<Self, TokenError> {
        let secret = auth.resolve_secret().ok_or(TokenError::MissingSecret)?;
        Ok(Self::new(secret.as_bytes(), auth.token_ttl_hours))
    }

    /// Sign a token for the given user id, valid for the configured window.
    pub fn issue(&self, user_id: i32) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry. Every failure mode (bad signature,
    /// malformed structure, expired) is reported uniformly as `None`.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<AccessClaims> {
        let validation = Validation::default();
        decode::<AccessClaims>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Cookie max-age matching the token validity window.
    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}
