use anyhow::{anyhow, Context};
use chrono::Duration;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variables read on top of `gnosis.toml`.
const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "DATABASE_URL",
    "DB_HOST",
    "DB_PORT",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "DB_MAX_CONNECTIONS",
    "JWT_SECRET",
    "JWT_EXPIRE",
    "FRONTEND_URL",
    "APP_ENV",
];

pub const DEFAULT_CONFIG_FILE: &str = "gnosis.toml";

static DEVELOPMENT: AtomicBool = AtomicBool::new(false);

/// Whether error responses may carry internal details.
pub fn is_development() -> bool {
    DEVELOPMENT.load(Ordering::Relaxed)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_max_connections: u32,
    pub jwt_secret: Option<String>,
    pub jwt_expire: String,
    pub frontend_url: Option<String>,
    pub app_env: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: None,
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "postgres".to_string(),
            db_password: "postgres".to_string(),
            db_name: "gnosis".to_string(),
            db_max_connections: 20,
            jwt_secret: None,
            jwt_expire: "7d".to_string(),
            frontend_url: None,
            app_env: "production".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `gnosis.toml` if present, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Self::figment(DEFAULT_CONFIG_FILE))
    }

    pub fn figment(config_file: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::raw().only(ENV_KEYS))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: AppConfig = figment.extract().context("Invalid configuration")?;
        config.validate()?;
        DEVELOPMENT.store(config.is_development(), Ordering::Relaxed);
        Ok(config)
    }

    /// Checks what every command needs. The signing secret is only required
    /// to serve, see [`Self::signing_secret`].
    pub fn validate(&self) -> anyhow::Result<()> {
        parse_duration(&self.jwt_expire)
            .with_context(|| format!("Invalid JWT_EXPIRE value '{}'", self.jwt_expire))?;
        Ok(())
    }

    pub fn signing_secret(&self) -> anyhow::Result<&str> {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(anyhow!("JWT_SECRET must be set")),
        }
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    /// `DATABASE_URL` wins; otherwise the URL is assembled from the `DB_*` parts.
    pub fn database_url(&self) -> String {
        match self.database_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
            ),
        }
    }

    pub fn jwt_expiry(&self) -> Duration {
        parse_duration(&self.jwt_expire).unwrap_or_else(|_| Duration::days(7))
    }
}

/// Parses `7d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return Err(anyhow!("empty duration"));
    }
    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };
    let amount: i64 = digits
        .trim()
        .parse()
        .map_err(|_| anyhow!("not a number: '{digits}'"))?;
    if amount <= 0 {
        return Err(anyhow!("duration must be positive"));
    }
    match unit.map(|c| c.to_ascii_lowercase()) {
        None | Some('s') => Ok(Duration::seconds(amount)),
        Some('m') => Ok(Duration::minutes(amount)),
        Some('h') => Ok(Duration::hours(amount)),
        Some('d') => Ok(Duration::days(amount)),
        Some('w') => Ok(Duration::weeks(amount)),
        Some(other) => Err(anyhow!("unknown unit '{other}'")),
    }
}
