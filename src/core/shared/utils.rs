use anyhow::{anyhow, Context, Result};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::shared::error::CrmError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn create_conn(config: &AppConfig) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(config.database_url());
    Pool::builder()
        .max_size(config.db_max_connections)
        .build(manager)
        .context("Failed to create database pool")
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().context("Failed to get connection for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Migration error: {e}"))?;
    for version in &applied {
        info!("Applied migration {version}");
    }
    Ok(())
}

/// Rounded percentage `100 * part / whole`, 0 when `whole` is 0.
pub fn percent(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as i64
}

/// Trimmed, non-empty request field.
pub fn required(value: Option<String>, what: &str) -> Result<String, CrmError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CrmError::Validation(format!("Please provide {what}"))),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2 && !tld.ends_with('.'))
}

pub fn validated_email(value: Option<String>) -> Result<String, CrmError> {
    let email = required(value, "an email")?.to_lowercase();
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(CrmError::Validation("Please provide a valid email".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert_eq!(required(Some("  Acme ".into()), "a name").unwrap(), "Acme");
        let err = required(Some("   ".into()), "a name").unwrap_err();
        assert_eq!(err.to_string(), "Please provide a name");
        assert!(required(None, "a name").is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ana@gnosis.io"));
        assert!(is_valid_email("first.last@mail.co.uk"));
        assert!(!is_valid_email("ana@gnosis"));
        assert!(!is_valid_email("@gnosis.io"));
        assert!(!is_valid_email("ana gnosis@x.io"));
        assert!(!is_valid_email("a@b@c.io"));
        assert_eq!(validated_email(Some("Ana@Gnosis.IO".into())).unwrap(), "ana@gnosis.io");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(17, 50), 34);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 5), 100);
    }
}
