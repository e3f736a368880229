use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::{health_check, shutdown_signal};
use crate::activities::configure_activity_routes;
use crate::analytics::configure_analytics_routes;
use crate::auth::configure_auth_routes;
use crate::core::shared::state::AppState;
use crate::leads::configure_leads_routes;
use crate::security::create_cors_layer;
use crate::tasks::configure_task_routes;
use crate::users::configure_users_routes;

/// Every API route with CORS and request tracing applied.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(app_state.config.frontend_url.as_deref());

    Router::new()
        .route("/api/health", get(health_check))
        .merge(configure_auth_routes())
        .merge(configure_leads_routes())
        .merge(configure_users_routes())
        .merge(configure_task_routes())
        .merge(configure_activity_routes())
        .merge(configure_analytics_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", app_state.config.host, app_state.config.port)
        .parse()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid listen address: {e}"),
            )
        })?;

    info!(
        "Starting gnosis in {} mode",
        app_state.config.app_env
    );
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}
