/// Authentication extractors and utilities
///
/// Sessions are owned by the external auth service. It issues HS256 tokens
/// signed with the shared secret, and the `sub` claim is the owner id.
use crate::{context::AppContext, error::HerdError, records::OwnerId};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims we rely on in bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerClaims {
    pub sub: String,
    pub exp: usize,
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Verify a JWT token and return the owner it was issued for
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
/// 3. Subject validation
pub fn verify_owner_token(token: &str, jwt_secret: &str) -> Result<OwnerId, HerdError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    let token_data = decode::<OwnerClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                HerdError::Authentication("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                HerdError::Authentication("Invalid token signature".to_string())
            }
            _ => HerdError::Authentication(format!("Invalid token: {}", e)),
        }
    })?;

    OwnerId::new(token_data.claims.sub)
}

/// Authenticated context - rejects the request with 401 without a valid token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub owner_id: OwnerId,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = HerdError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            HerdError::Authentication("You must be logged in to access this resource".to_string())
        })?;

        let owner_id = verify_owner_token(&token, &state.config.authentication.jwt_secret)?;

        Ok(AuthContext { owner_id })
    }
}

/// Optional authenticated context - does not fail if no auth provided
///
/// Used where the handler decides when a missing owner becomes an error.
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

impl OptionalAuthContext {
    pub fn owner_id(self) -> Option<OwnerId> {
        self.auth.map(|auth| auth.owner_id)
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = HerdError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = extract_bearer_token(&parts.headers).and_then(|token| {
            verify_owner_token(&token, &state.config.authentication.jwt_secret)
                .ok()
                .map(|owner_id| AuthContext { owner_id })
        });

        Ok(OptionalAuthContext { auth })
    }
}

/// Sign a token for `owner`, valid for `ttl_secs`
#[cfg(test)]
pub fn issue_test_token(owner: &str, jwt_secret: &str, ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let exp = (chrono::Utc::now().timestamp() + ttl_secs) as usize;
    encode(
        &Header::new(Algorithm::HS256),
        &OwnerClaims {
            sub: owner.to_string(),
            exp,
        },
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .unwrap()
}
