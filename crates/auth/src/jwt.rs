//! JWT decoding + signature verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token is malformed or has an invalid signature")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    InvalidClaims(#[from] TokenValidationError),
}

/// Token validation seam: verify signature + claims, return the claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// HMAC-SHA256 validator over a shared secret.
pub struct Hs256JwtValidator {
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks happen in `validate_claims` against our own
        // RFC3339 claim fields, not jsonwebtoken's numeric `exp`.
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();

        Self {
            decoding: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};
    use chrono::Duration;
    use defter_core::TenantId;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("failed to encode jwt")
    }

    fn test_claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("admin")],
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn round_trips_signed_claims() {
        let now = Utc::now();
        let claims = test_claims(now);
        let token = mint("secret", &claims);

        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint("secret", &test_claims(now));

        let validator = Hs256JwtValidator::new(b"other-secret".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let mut claims = test_claims(now);
        claims.expires_at = now - Duration::minutes(1);
        let token = mint("secret", &claims);

        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::InvalidClaims(TokenValidationError::Expired))
        ));
    }
}
