use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{AuthPayload, LoginRequest};
use crate::activities::types::Activity;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{ActivityType, Role};
use crate::core::shared::error::CrmError;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::required;
use crate::security::password::verify_password;
use crate::users::handlers::create_account;
use crate::users::types::{CreateUserRequest, User};

type ApiResult = Result<ApiResponse, CrmError>;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn payload(state: &AppState, user: User) -> Result<AuthPayload, CrmError> {
    let issued = state
        .jwt
        .issue(&user)
        .map_err(|e| CrmError::Internal(e.to_string()))?;
    Ok(AuthPayload {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    })
}

/// Public sign-up. Staff accounts only; admins are created by other admins.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult {
    if req.role == Some(Role::Admin) {
        return Err(CrmError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }
    let user = create_account(&state, req, Role::Warmer).await?;
    Ok(ApiResponse::created(payload(&state, user)?))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult {
    let email = required(req.email, "an email and password")?.to_lowercase();
    let password = required(req.password, "an email and password")?;

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        return Err(CrmError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };
    let valid = verify_password(password, user.password_hash.clone())
        .await
        .map_err(|e| CrmError::Internal(e.to_string()))?;
    if !valid {
        warn!("Failed login for {}", user.id);
        return Err(CrmError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    state
        .store
        .insert_activity(
            Activity::new(ActivityType::UserLogin, Some(user.id), "User logged in")
                .with_target(user.name.clone()),
        )
        .await?;
    info!("User {} logged in", user.id);
    Ok(ApiResponse::ok(payload(&state, user)?))
}

pub async fn logout(State(state): State<Arc<AppState>>, auth: AuthenticatedUser) -> ApiResult {
    state.jwt.revoke_token(&auth.claims).await;
    state
        .store
        .insert_activity(
            Activity::new(ActivityType::UserLogout, Some(auth.id()), "User logged out")
                .with_target(auth.user.name.clone()),
        )
        .await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

pub async fn me(auth: AuthenticatedUser) -> ApiResult {
    Ok(ApiResponse::ok(auth.user))
}
