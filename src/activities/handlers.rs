use axum::extract::{Query, State};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{
    Activity, ActivityFilter, ActivityView, CreateActivityRequest, ListActivitiesQuery,
    RecentQuery,
};
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::Role;
use crate::core::shared::error::CrmError;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::store::{Page, DEFAULT_PAGE_SIZE};

type ApiResult = Result<ApiResponse, CrmError>;

pub const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Resolves actor and lead names for a page of activities.
pub async fn expand_activities(
    state: &AppState,
    activities: Vec<Activity>,
) -> Result<Vec<ActivityView>, CrmError> {
    let mut users: HashMap<Uuid, Option<(String, Role)>> = HashMap::new();
    let mut leads: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut out = Vec::with_capacity(activities.len());

    for activity in activities {
        if let Some(id) = activity.user_id {
            if !users.contains_key(&id) {
                let user = state.store.get_user(id).await?.map(|u| (u.name, u.role));
                users.insert(id, user);
            }
        }
        if let Some(id) = activity.related_lead {
            if !leads.contains_key(&id) {
                let name = state.store.get_lead(id).await?.map(|l| l.name);
                leads.insert(id, name);
            }
        }
        let user = activity
            .user_id
            .and_then(|id| users.get(&id).cloned().flatten());
        out.push(ActivityView {
            user_name: user.as_ref().map(|(name, _)| name.clone()),
            user_role: user.map(|(_, role)| role),
            related_lead_name: activity
                .related_lead
                .and_then(|id| leads.get(&id).cloned().flatten()),
            activity,
        });
    }
    Ok(out)
}

pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<ListActivitiesQuery>,
) -> ApiResult {
    let filter = ActivityFilter {
        activity_type: query.activity_type,
        user_id: if auth.is_admin() {
            query.user
        } else {
            Some(auth.id())
        },
        search: query.search.filter(|s| !s.trim().is_empty()),
        ..ActivityFilter::default()
    };
    let page = Page::from_query(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let total = state.store.count_activities(&filter).await?;
    let activities = state.store.list_activities(&filter, page).await?;
    Ok(ApiResponse::list(expand_activities(&state, activities).await?)
        .with("total", total)
        .with("page", page.number())
        .with("pages", page.pages(total)))
}

pub async fn create_activity(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateActivityRequest>,
) -> ApiResult {
    let activity_type = req
        .activity_type
        .ok_or_else(|| CrmError::Validation("Please provide an activity type".to_string()))?;
    if let Some(lead_id) = req.related_lead {
        if state.store.get_lead(lead_id).await?.is_none() {
            return Err(CrmError::Validation("Related lead does not exist".to_string()));
        }
    }

    let mut activity = Activity::new(activity_type, Some(auth.id()), req.details.unwrap_or_default())
        .with_target(req.target.unwrap_or_default());
    if let Some(lead_id) = req.related_lead {
        activity = activity.with_lead(lead_id);
    }
    if let Some(metadata) = req.metadata {
        activity = activity.with_metadata(metadata);
    }

    let activity = state.store.insert_activity(activity).await?;
    let view = expand_activities(&state, vec![activity])
        .await?
        .pop()
        .ok_or_else(|| CrmError::Internal("activity expansion returned nothing".into()))?;
    Ok(ApiResponse::created(view))
}

pub async fn recent_activities(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<RecentQuery>,
) -> ApiResult {
    let filter = if auth.is_admin() {
        ActivityFilter::default()
    } else {
        ActivityFilter::for_user(auth.id())
    };
    let page = Page::from_query(Some(1), query.limit, DEFAULT_RECENT_LIMIT);
    let activities = state.store.list_activities(&filter, page).await?;
    Ok(ApiResponse::list(expand_activities(&state, activities).await?))
}
