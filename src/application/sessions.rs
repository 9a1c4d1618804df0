//! Session tokens and credential hashing.
//!
//! Login issues a signed, expiring token that travels in an HttpOnly
//! cookie; every authenticated request verifies it back into an
//! [`Actor`]. The token carries only the user id; profile fields are
//! re-read per request so they cannot go stale inside a live session.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session token presented")]
    Missing,
    #[error("session token is invalid")]
    Invalid,
    #[error("session token has expired")]
    Expired,
    #[error("credential hashing failed")]
    Hashing,
}

/// The authenticated identity attached to a request after the session
/// middleware has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

/// Issues and verifies session tokens (HS256).
pub struct SessionService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Session lifetime, exposed so the cookie max-age can match.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, SessionError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|_| SessionError::Invalid)
    }

    pub fn verify(&self, token: &str) -> Result<Actor, SessionError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })?;
        Ok(Actor {
            id: data.claims.sub,
        })
    }
}

/// Hash a password for storage.
pub fn hash_password(plain: &str) -> Result<String, SessionError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| SessionError::Hashing)
}

/// Check a password against its stored hash.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}
