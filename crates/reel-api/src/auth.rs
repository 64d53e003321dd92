//! Bearer token authentication.
//!
//! Agents authenticate with HS256 JWTs whose `sub` claim is the agent id.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use reel_models::AgentId;

use crate::error::ApiError;
use crate::state::AppState;

/// Decoded token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Agent id
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Authenticated agent extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub agent_id: AgentId,
}

/// Verifies bearer tokens against the shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    /// An empty secret rejects every token.
    pub fn new(secret: &str) -> Self {
        let key = (!secret.is_empty()).then(|| DecodingKey::from_secret(secret.as_bytes()));
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Token verification is not configured"))?;

        let data = decode::<Claims>(token, key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            ApiError::unauthorized("Invalid or expired token")
        })?;

        Ok(data.claims)
    }
}

/// Issue an HS256 token for `agent_id`, valid for `ttl_secs`.
pub fn issue_token(secret: &str, agent_id: &str, ttl_secs: i64) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: agent_id.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("Failed to sign token: {e}")))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.auth.verify(token.trim())?;

        let agent_id = AgentId::from_string(claims.sub);
        if agent_id.is_blank() {
            return Err(ApiError::unauthorized("Token has no subject"));
        }

        Ok(AuthUser { agent_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies() {
        let token = issue_token("secret", "agent-7", 60).unwrap();
        let claims = JwtVerifier::new("secret").verify(&token).unwrap();
        assert_eq!(claims.sub, "agent-7");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token("secret", "agent-7", 60).unwrap();
        assert!(JwtVerifier::new("other").verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = issue_token("secret", "agent-7", -3600).unwrap();
        assert!(JwtVerifier::new("secret").verify(&token).is_err());
    }

    #[test]
    fn test_unconfigured_verifier_rejects() {
        let token = issue_token("secret", "agent-7", 60).unwrap();
        assert!(JwtVerifier::new("").verify(&token).is_err());
    }
}
