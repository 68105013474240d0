use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig, error::AuthError};

/// Signs and verifies time-bound session tokens with the process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenIssuer {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn issue(&self, subject: Uuid, ttl: Duration) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| {
                error!(ttl_secs = ttl.as_secs(), "token lifetime out of range");
                AuthError::Internal("token lifetime out of range".into())
            })?;
        let claims = Claims {
            sub: subject,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode error");
            AuthError::Internal(e.to_string())
        })?;
        debug!(user_id = %subject, "jwt signed");
        Ok(token)
    }

    /// Returns the token's subject.
    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    debug!(error = %e, "jwt rejected");
                    AuthError::TokenInvalid
                }
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
pub(crate) fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "dev-secret".into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
        ttl_minutes: 60 * 24,
    }
}
