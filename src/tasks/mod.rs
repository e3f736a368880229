pub mod handlers;
pub mod types;

pub use types::{Task, TaskFilter, TaskView};

use crate::core::shared::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn configure_task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/tasks/:id",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
}
