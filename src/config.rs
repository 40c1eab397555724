//! Runtime configuration, read from the environment (and `.env` in development).

use std::path::PathBuf;

use anyhow::{Context, Result};
use time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub otp_ttl: Duration,
    pub token_ttl: Duration,
    /// When both are set, an admin with these credentials is created at startup if missing.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub const DEFAULT_PORT: u16 = 5000;

    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").context("No database URL provided")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("No JWT_SECRET provided")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            port: parse_var("PORT", Self::DEFAULT_PORT)?,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            otp_ttl: Duration::seconds(parse_var("OTP_TTL_SECONDS", 300)?),
            token_ttl: Duration::hours(parse_var("TOKEN_TTL_HOURS", 24)?),
            admin_username: std::env::var("ADMIN_USERNAME").ok(),
            admin_password: std::env::var("ADMIN_PASSWORD").ok(),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, value)),
        Err(_) => Ok(default),
    }
}
