pub mod dashboard;
pub mod performance;
pub mod trend;

use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::error::CrmError;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;

pub use dashboard::{dashboard, DashboardSummary};
pub use performance::{performance_report, PerformanceReport};
pub use trend::{mrr_trend, MrrPoint};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceQuery {
    pub user_id: Option<Uuid>,
}

pub fn configure_analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/analytics/dashboard", get(handle_dashboard))
        .route("/api/analytics/performance", get(handle_performance))
        .route("/api/analytics/mrr", get(handle_mrr))
}

pub async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<ApiResponse, CrmError> {
    let summary = dashboard(state.store.as_ref(), &auth.user).await?;
    Ok(ApiResponse::ok(summary))
}

pub async fn handle_performance(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<PerformanceQuery>,
) -> Result<ApiResponse, CrmError> {
    let user_id = query.user_id.unwrap_or_else(|| auth.id());
    if !auth.is_admin() && user_id != auth.id() {
        return Err(CrmError::Forbidden(
            "Not authorized to view these metrics".to_string(),
        ));
    }
    let user = if user_id == auth.id() {
        auth.user
    } else {
        state
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CrmError::not_found("User"))?
    };

    let report = performance_report(state.store.as_ref(), &user, Utc::now()).await?;
    Ok(ApiResponse::ok(report))
}

pub async fn handle_mrr(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> Result<ApiResponse, CrmError> {
    auth.require_admin()?;
    let points = mrr_trend(state.store.as_ref(), Utc::now()).await?;
    Ok(ApiResponse::ok(points))
}
