pub mod assignment;
pub mod handlers;
pub mod types;

pub use assignment::{auto_assign, AssignmentOutcome, AssignmentResult};
pub use types::{Lead, LeadFilter, LeadMessage, LeadNote, LeadView};

use crate::core::shared::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn configure_leads_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/leads",
            get(handlers::list_leads).post(handlers::create_lead),
        )
        .route("/api/leads/assign", post(handlers::assign_leads))
        .route(
            "/api/leads/:id",
            get(handlers::get_lead)
                .put(handlers::update_lead)
                .delete(handlers::delete_lead),
        )
        .route(
            "/api/leads/:id/notes",
            get(handlers::list_notes).post(handlers::add_note),
        )
        .route(
            "/api/leads/:id/messages",
            get(handlers::list_messages).post(handlers::add_message),
        )
}
