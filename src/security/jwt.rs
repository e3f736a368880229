use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::shared::enums::{Role, StaffTier};
use crate::users::types::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<StaffTier>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn for_user(user: &User, expiry: DateTime<Utc>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            tier: user.tier,
            iat: Utc::now().timestamp(),
            exp: expiry.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signer with an in-process revocation list keyed by `jti`.
/// Entries are kept until the token's own `exp`; after that signature
/// validation rejects the token anyway.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
    blacklist: Arc<RwLock<HashMap<String, i64>>>,
}

impl JwtManager {
    pub fn new(secret: &str, expiry: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow!("JWT secret must not be empty"));
        }
        if secret.len() < 32 {
            warn!("JWT secret is shorter than 32 characters");
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
            blacklist: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let expires_at = Utc::now() + self.expiry;
        let claims = Claims::for_user(user, expires_at);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode token: {e}"))?;
        debug!("Issued token {} for user {}", claims.jti, user.id);
        Ok(IssuedToken { token, expires_at })
    }

    /// Signature and expiry only; see [`Self::validate_with_blacklist`].
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }

    pub async fn validate_with_blacklist(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if self.is_revoked(&claims.jti).await {
            return Err(anyhow!("Token has been revoked"));
        }
        Ok(claims)
    }

    /// Revokes the token until it expires. Stale entries are pruned on
    /// every insert.
    pub async fn revoke_token(&self, claims: &Claims) {
        if claims.is_expired() {
            return;
        }
        let now = Utc::now().timestamp();
        let mut blacklist = self.blacklist.write().await;
        blacklist.retain(|_, exp| *exp >= now);
        blacklist.insert(claims.jti.clone(), claims.exp);
        debug!("Revoked token {} ({} revocations held)", claims.jti, blacklist.len());
    }

    pub async fn is_revoked(&self, jti: &str) -> bool {
        self.blacklist.read().await.contains_key(jti)
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
