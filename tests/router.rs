//! Routing, authentication and validation that happen before any query runs.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use schoolhouse::auth::Principal;

use common::{expired_token_for, offline_app, send, token_for};

#[tokio::test]
async fn one_time_codes_are_six_digits() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/send-otp",
        None,
        Some(json!({ "mobileNo": "9876543210" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let otp = body["otp"].as_str().unwrap();
    assert_eq!(otp.len(), 6);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn numeric_mobile_numbers_are_accepted() {
    let app = offline_app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/resend-otp",
        None,
        Some(json!({ "mobileNo": 9876543210u64 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_mobile_numbers_are_rejected() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/send-otp",
        None,
        Some(json!({ "mobileNo": "12ab" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn registering_with_a_wrong_code_fails() {
    let app = offline_app();
    send(
        &app,
        Method::POST,
        "/api/auth/send-otp",
        None,
        Some(json!({ "mobileNo": "9876543210" })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Asha",
            "class": "10A",
            "rollNo": "7",
            "mobileNo": "9876543210",
            "password": "secret1",
            "otp": "not-the-code",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or missing OTP");
}

#[tokio::test]
async fn student_login_requires_the_pending_code() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "role": "student", "mobileNo": "9876543210", "otp": "123456" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or missing OTP");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = offline_app();

    for uri in [
        "/api/admin/students",
        "/api/faculty/subjects",
        "/api/students/profile",
        "/api/subjects",
        "/api/announcements/1/comments",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["statusCode"], 401);
    }
}

#[tokio::test]
async fn changing_a_password_needs_a_token() {
    let app = offline_app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/change-password",
        None,
        Some(json!({ "role": "Admin", "username": "admin", "newPassword": "hunter22" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roles_are_enforced_per_route() {
    let app = offline_app();
    let student = token_for(Principal::Student(1));
    let faculty = token_for(Principal::Faculty(1));

    let (status, body) = send(&app, Method::GET, "/api/admin/students", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access forbidden");

    let (status, _) = send(&app, Method::GET, "/api/admin/teachers", Some(&faculty), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/students/profile", Some(&faculty), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/faculty/profile", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/subjects/1/students", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let app = offline_app();
    let token = expired_token_for(Principal::Admin(1));

    let (status, body) = send(&app, Method::GET, "/api/admin/students", Some(&token), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn forged_tokens_are_rejected() {
    let app = offline_app();
    let forged = schoolhouse::auth::token::TokenIssuer::new("some-other-secret", time::Duration::hours(1))
        .issue(Principal::Admin(1))
        .unwrap();

    for token in [forged.as_str(), "not-a-jwt"] {
        let (status, _) = send(&app, Method::GET, "/api/admin/students", Some(token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn unknown_routes_are_json_not_found() {
    let app = offline_app();

    let (status, body) = send(&app, Method::GET, "/api/nothing-here", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["statusCode"], 404);
}

#[tokio::test]
async fn both_approval_paths_are_routed() {
    let app = offline_app();
    let student = token_for(Principal::Student(1));

    for uri in ["/api/admin/students/approve/5", "/api/admin/students/5/approve"] {
        let (status, body) = send(&app, Method::POST, uri, Some(&student), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["message"], "Access forbidden");
    }
}

#[tokio::test]
async fn malformed_bodies_are_json_bad_requests() {
    let app = offline_app();
    let admin = token_for(Principal::Admin(1));

    let cases = [
        ("/api/auth/login", None, json!({ "role": "Janitor" })),
        ("/api/auth/login", None, json!({ "mobileNo": "9876543210" })),
        ("/api/auth/register", None, json!({ "name": "A", "rollNo": [1] })),
        (
            "/api/admin/students/5/fee-status",
            Some(admin.as_str()),
            json!({ "status": "Paid" }),
        ),
    ];

    for (uri, token, body) in cases {
        let method = if uri.ends_with("fee-status") { Method::PUT } else { Method::POST };
        let (status, response) = send(&app, method, uri, token, Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response["statusCode"], 400);
        assert!(response["message"].as_str().unwrap().starts_with("Invalid request body"));
    }
}

#[tokio::test]
async fn non_numeric_ids_are_bad_requests() {
    let app = offline_app();
    let admin = token_for(Principal::Admin(1));

    let (status, body) = send(&app, Method::GET, "/api/admin/students/abc", Some(&admin), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid path"));
}
