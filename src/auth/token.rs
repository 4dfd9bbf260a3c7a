use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Represents the claims encoded within a signed access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the principal's username.
    pub sub: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// Stateless codec for the short-lived signed access token.
///
/// Holds the HS256 keys derived from the configured secret plus the fixed
/// access-token TTL. Constructed once at startup from `Config` and shared
/// with handlers and middleware; issuing and decoding are pure CPU work,
/// safe to run on every request with no store access.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
        }
    }

    /// Lifetime of issued tokens, in seconds. Reported to clients as
    /// `expiresIn` alongside each token pair.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Issues a signed token for the given subject, expiring `access_ttl`
    /// from now.
    pub fn issue(&self, subject: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.access_ttl)
            .expect("valid timestamp")
            .timestamp() as usize;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token and decodes its claims.
    ///
    /// Malformed structure, signature mismatch, and expiry all collapse to
    /// `AppError::InvalidAccessToken`; the underlying reason is logged at
    /// debug only.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("access token rejected: {}", e);
                AppError::from(e)
            })
    }
}
