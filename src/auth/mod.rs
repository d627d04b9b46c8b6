use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;

/// Token payload. `sub` is the numeric user id that owns created products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(deserialize_with = "numeric_subject")]
    pub sub: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    pub fn new(user_id: i64, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: user_id,
            exp: expires_at.timestamp(),
            iat: Some(Utc::now().timestamp()),
        }
    }
}

/// Accepts `"sub": 42` as well as `"sub": "42"`
fn numeric_subject<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSubject {
        Number(i64),
        Text(String),
    }

    match RawSubject::deserialize(deserializer)? {
        RawSubject::Number(n) => Ok(n),
        RawSubject::Text(s) => s
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("subject '{}' is not a numeric user id", s))),
    }
}

/// Token lifetime in hours, rejected if it cannot be added to the current time
pub fn lifetime_from_hours(hours: u64) -> Result<Duration, JwtError> {
    i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .filter(|lifetime| Utc::now().checked_add_signed(*lifetime).is_some())
        .ok_or(JwtError::InvalidLifetime(hours))
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Token lifetime of {0} hours is out of range")]
    InvalidLifetime(u64),

    #[error("Token has expired")]
    Expired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

/// Issues and validates HS256 bearer tokens against one shared secret
pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl JwtAuthenticator {
    pub fn new(security: &SecurityConfig) -> Result<Self, JwtError> {
        let secret = security.jwt_secret.expose();
        if secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = security.jwt_leeway_secs;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry: lifetime_from_hours(security.jwt_expiry_hours)?,
        })
    }

    /// Token for `user_id` valid for the configured lifetime
    pub fn issue(&self, user_id: i64) -> Result<String, JwtError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.expiry)
            .ok_or(JwtError::InvalidLifetime(self.expiry.num_hours() as u64))?;
        self.issue_with_expiry(user_id, expires_at)
    }

    pub fn issue_with_expiry(&self, user_id: i64, expires_at: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims::new(user_id, expires_at);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    /// Verify signature and expiry, then return the claims
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            })
    }
}
