use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gnosis::core::config::AppConfig;
use gnosis::core::shared::state::AppState;
use gnosis::core::shared::utils::{create_conn, run_migrations};
use gnosis::main_module::run_axum_server;
use gnosis::main_module::seed::{seed, ADMIN_EMAIL, ADMIN_PASSWORD};
use gnosis::security::JwtManager;
use gnosis::store::PgStore;

enum Command {
    Serve,
    Migrate,
    Seed,
}

fn parse_command() -> Result<Command> {
    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => Ok(Command::Serve),
        Some("migrate") => Ok(Command::Migrate),
        Some("seed") => Ok(Command::Seed),
        Some(other) => Err(anyhow!(
            "Unknown command '{other}'. Usage: gnosis [serve|migrate|seed]"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gnosis=debug")),
        )
        .init();

    let command = parse_command()?;
    let config = AppConfig::load()?;
    info!("Configuration loaded ({} environment)", config.app_env);

    let pool = create_conn(&config).context("Failed to create database pool")?;
    run_migrations(&pool)?;
    let store = Arc::new(PgStore::new(pool));

    match command {
        Command::Migrate => {
            info!("Migrations complete");
        }
        Command::Seed => {
            let summary = seed(store.as_ref()).await?;
            info!(
                "Database seeded: {} users, {} leads, {} tasks, {} activities",
                summary.users, summary.leads, summary.tasks, summary.activities
            );
            info!("Admin login: {} / {}", ADMIN_EMAIL, ADMIN_PASSWORD);
        }
        Command::Serve => {
            let jwt = JwtManager::new(config.signing_secret()?, config.jwt_expiry())?;
            let state = Arc::new(AppState::new(config, store, jwt));
            run_axum_server(state).await?;
        }
    }
    Ok(())
}
