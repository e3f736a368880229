use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::security::jwt::JwtManager;
use crate::store::CrmStore;

/// Shared handler state. Cloned into every router as `Arc<AppState>`.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn CrmStore>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn CrmStore>, jwt: JwtManager) -> Self {
        Self {
            config,
            store,
            jwt: Arc::new(jwt),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("app_env", &self.config.app_env)
            .finish_non_exhaustive()
    }
}
