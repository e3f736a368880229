use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::shared::enums::Role;
use crate::core::shared::error::CrmError;
use crate::core::shared::state::AppState;
use crate::security::jwt::{extract_bearer_token, Claims};
use crate::users::types::User;

const NOT_AUTHORIZED: &str = "Not authorized to access this route";

/// Caller resolved from the bearer token. The user row is re-read on every
/// request so role and status changes apply immediately.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), CrmError> {
        if allowed.contains(&self.user.role) {
            Ok(())
        } else {
            Err(CrmError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                self.user.role
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), CrmError> {
        self.require_role(&[Role::Admin])
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = CrmError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| CrmError::Unauthorized(NOT_AUTHORIZED.to_string()))?;

        let claims = state.jwt.validate_with_blacklist(token).await.map_err(|e| {
            debug!("Rejected bearer token: {e}");
            CrmError::Unauthorized(NOT_AUTHORIZED.to_string())
        })?;

        let user = state
            .store
            .get_user(claims.id)
            .await?
            .ok_or_else(|| CrmError::Unauthorized("User no longer exists".to_string()))?;

        Ok(Self { user, claims })
    }
}
