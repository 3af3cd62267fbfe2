use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::{UserError, UserResult};
use crate::models::{AuthTokens, Role, User};

/// JWT claims carried by both access and refresh tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl TokenClaims {
    fn for_user(user: &User, ttl: Duration) -> UserResult<Self> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| UserError::Token(format!("token lifetime {:?} is out of range", ttl)))?;

        Ok(Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        })
    }

    /// Account id from `sub`; a non-UUID subject is an invalid token.
    pub fn user_id(&self) -> UserResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| UserError::InvalidToken)
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// HS256 token issuance and verification.
///
/// Access and refresh tokens use separate secrets, so neither verifies as
/// the other.
#[derive(Clone)]
pub struct TokenService {
    access: Arc<SigningKeys>,
    refresh: Arc<SigningKeys>,
    validation: Arc<Validation>,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: Arc::new(SigningKeys::new(&config.access_secret, config.access_ttl)),
            refresh: Arc::new(SigningKeys::new(&config.refresh_secret, config.refresh_ttl)),
            validation: Arc::new(validation),
        }
    }

    /// Signs an access/refresh pair concurrently. Fails if either signing fails.
    pub async fn issue_tokens(&self, user: &User) -> UserResult<AuthTokens> {
        let access_claims = TokenClaims::for_user(user, self.access.ttl)?;
        let refresh_claims = TokenClaims::for_user(user, self.refresh.ttl)?;
        let access_keys = self.access.clone();
        let refresh_keys = self.refresh.clone();

        let (access_token, refresh_token) = tokio::try_join!(
            sign_blocking(access_keys, access_claims),
            sign_blocking(refresh_keys, refresh_claims),
        )?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> UserResult<TokenClaims> {
        self.verify(token, &self.access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> UserResult<TokenClaims> {
        self.verify(token, &self.refresh)
    }

    fn verify(&self, token: &str, keys: &SigningKeys) -> UserResult<TokenClaims> {
        decode::<TokenClaims>(token, &keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected token");
                UserError::InvalidToken
            })
    }
}

fn sign(keys: &SigningKeys, claims: &TokenClaims) -> UserResult<String> {
    encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
        .map_err(|e| UserError::Token(e.to_string()))
}

async fn sign_blocking(keys: Arc<SigningKeys>, claims: TokenClaims) -> UserResult<String> {
    tokio::task::spawn_blocking(move || sign(&keys, &claims))
        .await
        .map_err(|e| UserError::Token(format!("signing task failed: {}", e)))?
}

#[cfg(test)]
pub(crate) fn test_token_service() -> TokenService {
    TokenService::new(
        &TokenConfig::new(
            "access-secret-that-is-at-least-32-chars",
            "refresh-secret-that-is-at-least-32-chars",
        )
        .unwrap(),
    )
}
