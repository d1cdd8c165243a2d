//! HS256 token issuing and validation.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use gasline_core::UserId;

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed or badly signed token: {0}")]
    Decode(String),

    #[error("failed to sign token: {0}")]
    Encode(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Validates a bearer token into claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Symmetric HS256 signer/validator.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for a user. Returns the encoded token and its claims.
    pub fn issue(
        &self,
        user_id: UserId,
        username: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, JwtClaims), TokenError> {
        let claims = JwtClaims {
            sub: user_id,
            username: username.to_string(),
            role,
            jti: Uuid::new_v4(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok((token, claims))
    }

    fn validation() -> Validation {
        // Claims carry RFC 3339 timestamps instead of `exp`; the window is checked
        // by `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        validation
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &Self::validation())
            .map_err(|e| TokenError::Decode(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates() {
        let jwt = Hs256Jwt::new(b"secret", Duration::minutes(30));
        let now = Utc::now();
        let user = UserId::new();
        let (token, issued) = jwt.issue(user, "courier01", Role::Delivery, now).unwrap();

        let claims = jwt.validate(&token, now + Duration::minutes(1)).unwrap();
        assert_eq!(claims, issued);
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Delivery);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let (token, _) = Hs256Jwt::new(b"one", Duration::minutes(5))
            .issue(UserId::new(), "a", Role::User, now)
            .unwrap();
        let err = Hs256Jwt::new(b"two", Duration::minutes(5))
            .validate(&token, now)
            .unwrap_err();
        assert!(matches!(err, TokenError::Decode(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = Hs256Jwt::new(b"secret", Duration::minutes(5));
        let now = Utc::now();
        let (token, _) = jwt.issue(UserId::new(), "a", Role::User, now).unwrap();
        let err = jwt.validate(&token, now + Duration::minutes(6)).unwrap_err();
        assert_eq!(err, TokenError::Claims(TokenValidationError::Expired));
    }

    #[test]
    fn garbage_is_rejected() {
        let jwt = Hs256Jwt::new(b"secret", Duration::minutes(5));
        assert!(jwt.validate("not-a-token", Utc::now()).is_err());
    }
}
