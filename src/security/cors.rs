use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<header::HeaderName>,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT],
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    /// `FRONTEND_URL` may hold a comma separated list of origins.
    pub fn from_frontend_url(frontend_url: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(origins) = frontend_url {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config
    }

    /// Credentials are only allowed with an explicit origin list; with no
    /// origins configured every origin is accepted.
    pub fn build(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{o}'");
                    None
                }
            })
            .collect();

        let cors = CorsLayer::new()
            .allow_methods(self.allowed_methods)
            .allow_headers(self.allowed_headers)
            .max_age(std::time::Duration::from_secs(self.max_age_secs));

        if origins.is_empty() {
            info!("CORS: no frontend origin configured, allowing any origin");
            cors.allow_origin(Any)
        } else {
            info!("CORS configured with {} allowed origins", origins.len());
            cors.allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
        }
    }
}

pub fn create_cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    CorsConfig::from_frontend_url(frontend_url).build()
}
