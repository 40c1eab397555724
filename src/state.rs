use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::otp::OtpStore;
use crate::auth::token::TokenIssuer;
use crate::config::Config;

/// Everything a handler needs, shared across requests as an axum `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: Arc<TokenIssuer>,
    pub otp: Arc<OtpStore>,
    pub upload_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(config: &Config, pool: PgPool) -> Self {
        Self {
            pool,
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl)),
            otp: Arc::new(OtpStore::new(config.otp_ttl)),
            upload_dir: Arc::new(config.upload_dir.clone()),
        }
    }
}
