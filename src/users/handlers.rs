use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::types::{
    CreateUserRequest, Leaderboard, ListUsersQuery, UpdateUserRequest, User, UserChanges,
    UserFilter, UserWithLeadCount,
};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{Role, StaffTier};
use crate::core::shared::error::CrmError;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{required, validated_email};
use crate::leads::types::LeadFilter;
use crate::security::password::{hash_password, validate_password};

type ApiResult = Result<ApiResponse, CrmError>;

pub const LEADERBOARD_SIZE: usize = 10;

pub fn check_tier(tier: Option<StaffTier>, role: Role) -> Result<(), CrmError> {
    match tier {
        Some(tier) if !tier.fits_role(role) => Err(CrmError::Validation(format!(
            "Tier {tier} is not valid for role {role}"
        ))),
        _ => Ok(()),
    }
}

/// Validates the request, hashes the password and inserts the user.
/// Shared by admin creation and self-registration.
pub async fn create_account(
    state: &AppState,
    req: CreateUserRequest,
    default_role: Role,
) -> Result<User, CrmError> {
    let name = required(req.name, "a name")?;
    let email = validated_email(req.email)?;
    let password = required(req.password, "a password")?;
    validate_password(&password).map_err(CrmError::Validation)?;

    let role = req.role.unwrap_or(default_role);
    check_tier(req.tier, role)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(CrmError::Conflict("User already exists".to_string()));
    }

    let hash = hash_password(password)
        .await
        .map_err(|e| CrmError::Internal(e.to_string()))?;

    let mut user = User::new(name, email, hash, role);
    user.tier = req.tier;
    user.phone = req.phone;
    if let Some(status) = req.status {
        user.status = status;
    }

    let user = state.store.insert_user(user).await?;
    info!("Created {} account {}", user.role, user.id);
    Ok(user)
}

async fn leads_count(state: &AppState, user: &User) -> Result<i64, CrmError> {
    let filter = match user.role {
        Role::Warmer => LeadFilter::all().warmer(user.id),
        Role::Closer => LeadFilter::all().closer(user.id),
        Role::Admin => return Ok(0),
    };
    Ok(state.store.count_leads(&filter).await?)
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult {
    auth.require_admin()?;
    let filter = UserFilter {
        role: query.role,
        ..UserFilter::default()
    };
    Ok(ApiResponse::list(state.store.list_users(&filter).await?))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult {
    auth.require_admin()?;
    let user = create_account(&state, req, Role::Warmer).await?;
    Ok(ApiResponse::created(user))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| CrmError::not_found("User"))?;
    let leads_count = leads_count(&state, &user).await?;
    Ok(ApiResponse::ok(UserWithLeadCount { user, leads_count }))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult {
    if id != auth.id() && !auth.is_admin() {
        return Err(CrmError::Forbidden(
            "Not authorized to update this user".to_string(),
        ));
    }
    let current = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| CrmError::not_found("User"))?;

    let admin_only = req.role.is_some()
        || req.tier.is_some()
        || req.performance_score.is_some()
        || req.leads_handled.is_some()
        || req.conversion_rate.is_some()
        || req.avg_deal_size.is_some()
        || req.referrals.is_some();
    if admin_only && !auth.is_admin() {
        return Err(CrmError::Forbidden(
            "Only admins can change role, tier or performance figures".to_string(),
        ));
    }

    let role = req.role.unwrap_or(current.role);
    if role != Role::Admin {
        check_tier(req.tier.or(current.tier), role)?;
    }

    let email = match req.email {
        Some(email) => {
            let email = validated_email(Some(email))?;
            if let Some(other) = state.store.find_user_by_email(&email).await? {
                if other.id != id {
                    return Err(CrmError::Conflict("Email is already in use".to_string()));
                }
            }
            Some(email)
        }
        None => None,
    };

    let changes = UserChanges {
        name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        email,
        role: req.role,
        tier: req.tier,
        status: req.status,
        phone: req.phone,
        performance_score: req.performance_score,
        leads_handled: req.leads_handled,
        conversion_rate: req.conversion_rate,
        avg_deal_size: req.avg_deal_size,
        referrals: req.referrals,
        available_start: req.available_start,
        available_end: req.available_end,
        timezone: req.timezone,
        notify_new_lead_assignments: req.notify_new_lead_assignments,
        notify_lead_responses: req.notify_lead_responses,
        notify_performance_reports: req.notify_performance_reports,
        notify_training_updates: req.notify_training_updates,
        updated_at: Some(Utc::now()),
    };

    let user = state
        .store
        .update_user(id, changes)
        .await?
        .ok_or_else(|| CrmError::not_found("User"))?;
    Ok(ApiResponse::ok(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    auth.require_admin()?;
    if id == auth.id() {
        return Err(CrmError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }
    if !state.store.delete_user(id).await? {
        return Err(CrmError::not_found("User"));
    }
    info!("User {id} deleted by {}", auth.id());
    Ok(ApiResponse::message("User deleted successfully"))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    _auth: AuthenticatedUser,
) -> ApiResult {
    let warmers = state.store.list_users(&UserFilter::role(Role::Warmer)).await?;
    let closers = state.store.list_users(&UserFilter::role(Role::Closer)).await?;

    Ok(ApiResponse::ok(Leaderboard {
        top_warmers: warmers.iter().take(LEADERBOARD_SIZE).map(Into::into).collect(),
        top_closers: closers.iter().take(LEADERBOARD_SIZE).map(Into::into).collect(),
    }))
}
