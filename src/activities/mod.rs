pub mod handlers;
pub mod types;

pub use types::{Activity, ActivityFilter, ActivityView};

use crate::core::shared::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn configure_activity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route("/api/activities/recent", get(handlers::recent_activities))
}
