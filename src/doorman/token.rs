//! Bearer token issuance and verification.
//!
//! HS256 over a server-held secret, claims carry the account id and username
//! and a 10 day expiry. The service refuses to start without a secret; there
//! is no fallback key.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const TOKEN_TTL_DAYS: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("access token secret is not configured")]
    MissingSecret,

    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,
}

/// Identity claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build the service from the configured signing secret.
    ///
    /// # Errors
    /// Returns `TokenError::MissingSecret` for an empty secret. Falling back
    /// to a default key would silently break token integrity across restarts.
    pub fn new(secret: &SecretString) -> Result<Self, TokenError> {
        let secret = secret.expose_secret();
        if secret.trim().is_empty() {
            return Err(TokenError::MissingSecret);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        })
    }

    /// Sign `{sub, username}` claims with a 10 day expiry.
    ///
    /// # Errors
    /// Returns `TokenError::Invalid` if signing fails.
    pub fn issue(&self, id: Uuid, username: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(id, username, Duration::days(TOKEN_TTL_DAYS))
    }

    pub(crate) fn issue_with_ttl(
        &self,
        id: Uuid,
        username: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|_| TokenError::Invalid)
    }

    /// Validate signature and expiry, returning the embedded claims.
    ///
    /// # Errors
    /// `TokenError::Expired` past the embedded expiry, `TokenError::Invalid`
    /// for anything else (bad signature, malformed token). Callers message
    /// the two differently: re-login versus malformed request.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}
