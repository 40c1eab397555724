use std::net::SocketAddr;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use schoolhouse::config::Config;
use schoolhouse::models::admin::Admin;
use schoolhouse::routes::app;
use schoolhouse::state::AppState;

const DEFAULT_LOG_FILTER: &str = "schoolhouse=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        if Admin::ensure_seeded(username, password, &pool).await? {
            tracing::info!(%username, "created admin account");
        }
    }

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let state = AppState::new(&config, pool);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "listening");

    axum::Server::bind(&addr)
        .serve(app(state).into_make_service())
        .await
        .context("Server failed")?;

    Ok(())
}
