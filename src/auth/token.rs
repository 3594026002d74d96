use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::Role;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Claims of the short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the long-lived refresh token. `jti` keeps tokens issued to the
/// same principal within one second distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// A signed refresh token together with the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 access and refresh tokens.
pub struct TokenCodec {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(
        access_secret: impl Into<Vec<u8>>,
        refresh_secret: impl Into<Vec<u8>>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.access_secret.as_bytes(),
            config.refresh_secret.as_bytes(),
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    pub fn access_secret(&self) -> &[u8] {
        &self.access_secret
    }

    pub fn refresh_secret(&self) -> &[u8] {
        &self.refresh_secret
    }

    pub fn issue_access(&self, principal_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.issue_access_at(principal_id, role, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        principal_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = AccessClaims {
            sub: principal_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        sign(&claims, &self.access_secret)
    }

    pub fn issue_refresh(&self, principal_id: Uuid) -> Result<IssuedRefresh, TokenError> {
        self.issue_refresh_at(principal_id, Utc::now())
    }

    pub fn issue_refresh_at(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefresh, TokenError> {
        let expires_at = now + self.refresh_ttl;
        let claims = RefreshClaims {
            sub: principal_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        Ok(IssuedRefresh {
            token: sign(&claims, &self.refresh_secret)?,
            expires_at,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh_secret)
    }
}

fn sign<C: Serialize>(claims: &C, secret: &[u8]) -> Result<String, TokenError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Checks the MAC and `exp > now`. Malformed input counts as a bad signature.
pub fn verify<C: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<C, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<C>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::InvalidSignature,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            "access_secret",
            "refresh_secret",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn test_access_token_carries_subject_and_role() {
        let codec = codec();
        let id = Uuid::new_v4();
        let token = codec.issue_access(id, Role::Admin).unwrap();

        let claims = codec.verify_access(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_lifetime_and_uniqueness() {
        let codec = codec();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let first = codec.issue_refresh_at(id, now).unwrap();
        let second = codec.issue_refresh_at(id, now).unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(first.expires_at, now + Duration::days(7));

        let claims = codec.verify_refresh(&first.token).unwrap();
        assert_eq!(claims.sub, id);
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let codec = codec();
        let token = codec.issue_access(Uuid::new_v4(), Role::User).unwrap();

        // An access token never verifies as a refresh token.
        assert_eq!(
            codec.verify_refresh(&token).unwrap_err(),
            TokenError::InvalidSignature
        );
        assert_eq!(
            verify::<AccessClaims>(&token, b"another_secret").unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let issued_at = Utc::now() - Duration::minutes(30);
        let token = codec
            .issue_access_at(Uuid::new_v4(), Role::User, issued_at)
            .unwrap();

        assert_eq!(codec.verify_access(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_garbage_token() {
        let codec = codec();
        assert_eq!(
            codec.verify_access("not.a.jwt").unwrap_err(),
            TokenError::InvalidSignature
        );
        assert_eq!(codec.verify_access("").unwrap_err(), TokenError::InvalidSignature);
    }
}
