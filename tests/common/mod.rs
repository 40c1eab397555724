#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use time::Duration;
use tower::ServiceExt;

use schoolhouse::auth::token::TokenIssuer;
use schoolhouse::auth::Principal;
use schoolhouse::config::Config;
use schoolhouse::routes::app;
use schoolhouse::state::AppState;

pub const SECRET: &str = "integration-test-secret";

pub fn config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_owned(),
        database_max_connections: 2,
        jwt_secret: SECRET.to_owned(),
        port: Config::DEFAULT_PORT,
        upload_dir: std::env::temp_dir().join("schoolhouse-test-uploads"),
        otp_ttl: Duration::minutes(5),
        token_ttl: Duration::hours(24),
        admin_username: None,
        admin_password: None,
    }
}

/// An app whose pool never connects. Only routes that fail before touching
/// the database can be exercised with it.
pub fn offline_app() -> Router {
    let config = config("postgres://schoolhouse@localhost:1/unreachable");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy(&config.database_url)
        .expect("lazy pool");

    app(AppState::new(&config, pool))
}

pub fn token_for(principal: Principal) -> String {
    TokenIssuer::new(SECRET, Duration::hours(24))
        .issue(principal)
        .expect("token")
}

pub fn expired_token_for(principal: Principal) -> String {
    TokenIssuer::new(SECRET, Duration::hours(-1))
        .issue(principal)
        .expect("token")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}
