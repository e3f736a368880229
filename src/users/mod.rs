pub mod handlers;
pub mod types;

pub use types::{User, UserChanges, UserFilter};

use crate::core::shared::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/api/users/leaderboard", get(handlers::leaderboard))
        .route(
            "/api/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
