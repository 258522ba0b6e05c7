use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tally::config::Config;
use tower::ServiceExt;

const TEST_SECRET: &str = "integration-test-signing-secret";

/// Bootstrap admin seeded by migration (must match m20260710_add_users.rs)
const ADMIN_USER: &str = "admin";
const ADMIN_PASSWORD: &str = "password";

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // A single pooled connection keeps the in-memory database alive and
    // visible to every query.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.auth.token_secret = Some(TEST_SECRET.to_string());
    config.server.secure_cookies = false;
    // Cheap hashing keeps the suite fast.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = tally::api::create_app_state(config)
        .await
        .expect("Failed to create app state");
    tally::api::router(state)
}

/// Log in and return the `auth_token=<value>` cookie pair on success.
async fn login(app: &Router, username: &str, password: &str) -> Option<String> {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    if response.status() != StatusCode::OK {
        return None;
    }

    let set_cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    Some(set_cookie.split(';').next()?.to_string())
}

async fn signup(app: &Router, username: &str, password: &str) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/signup")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    response.status()
}

async fn get_with_cookie(app: &Router, uri: &str, cookie: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_admin_page_redirects_anonymous() {
    let app = spawn_app().await;

    let response = get_with_cookie(&app, "/admin", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_admin_page_allows_admin() {
    let app = spawn_app().await;

    let cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD)
        .await
        .expect("admin login should succeed");

    let response = get_with_cookie(&app, "/admin", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_page_redirects_user_role() {
    let app = spawn_app().await;

    assert_eq!(signup(&app, "charlie", "charlie-pw").await, StatusCode::CREATED);
    let cookie = login(&app, "charlie", "charlie-pw")
        .await
        .expect("login should succeed after signup");

    let response = get_with_cookie(&app, "/admin", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_login_sets_httponly_cookie() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "username": ADMIN_USER, "password": ADMIN_PASSWORD })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();

    assert!(set_cookie.starts_with("auth_token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=86400"));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let app = spawn_app().await;

    let attempt = |username: &str, password: &str| {
        let app = app.clone();
        let body = serde_json::json!({ "username": username, "password": password }).to_string();
        async move {
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    let wrong_password = attempt(ADMIN_USER, "not-the-password").await;
    let unknown_user = attempt("nobody", "not-the-password").await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    // Same body for both: no oracle on which part was wrong.
    let a = wrong_password.into_body().collect().await.unwrap().to_bytes();
    let b = unknown_user.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_api_unauthorized_is_uniform() {
    let app = spawn_app().await;

    // Missing token, garbage token, and a correctly signed but expired
    // token must be indistinguishable.
    let expired = tally::auth::token::TokenService::new(TEST_SECRET.as_bytes(), -2)
        .issue(1)
        .unwrap();

    let missing = get_with_cookie(&app, "/api/users/me", None).await;
    let garbage = get_with_cookie(&app, "/api/users/me", Some("auth_token=garbage")).await;
    let expired =
        get_with_cookie(&app, "/api/users/me", Some(&format!("auth_token={expired}"))).await;

    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);

    let a = missing.into_body().collect().await.unwrap().to_bytes();
    let b = garbage.into_body().collect().await.unwrap().to_bytes();
    let c = expired.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(a, b);
    assert_eq!(b, c);

    let body: serde_json::Value = serde_json::from_slice(&a).unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let app = spawn_app().await;

    let cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD).await.unwrap();

    // Flip one character inside the token payload.
    let mut tampered = cookie.into_bytes();
    let mid = tampered.len() / 2;
    tampered[mid] = if tampered[mid] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = get_with_cookie(&app, "/admin", Some(&tampered)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn test_user_role_cannot_list_users() {
    let app = spawn_app().await;

    assert_eq!(signup(&app, "dana", "dana-password").await, StatusCode::CREATED);
    let cookie = login(&app, "dana", "dana-password").await.unwrap();

    let response = get_with_cookie(&app, "/api/users", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_admin_lists_users() {
    let app = spawn_app().await;

    let cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD).await.unwrap();

    let response = get_with_cookie(&app, "/api/users", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let users = body["data"].as_array().unwrap();
    assert!(users.iter().any(|u| u["username"] == "admin"));
    // Hashes must never be serialized.
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn test_me_returns_principal() {
    let app = spawn_app().await;

    let cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD).await.unwrap();

    let response = get_with_cookie(&app, "/api/users/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = spawn_app().await;

    let cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::COOKIE, cookie.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();

    assert!(set_cookie.starts_with("auth_token="));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_promotion_applies_to_existing_token() {
    let app = spawn_app().await;

    assert_eq!(signup(&app, "erin", "erin-password").await, StatusCode::CREATED);
    let erin_cookie = login(&app, "erin", "erin-password").await.unwrap();

    // Still a plain user: page is gated.
    let response = get_with_cookie(&app, "/admin", Some(&erin_cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Admin promotes erin.
    let admin_cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD).await.unwrap();
    let response = get_with_cookie(&app, "/api/users", Some(&admin_cookie)).await;
    let body = body_json(response).await;
    let erin_id = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "erin")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/users/{erin_id}"))
                .header(header::COOKIE, admin_cookie.as_str())
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "role": "admin", "team_id": null, "team_member_id": null })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Tokens carry only the user id, so the original cookie picks up the
    // new role on the very next request.
    let response = get_with_cookie(&app, "/admin", Some(&erin_cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = spawn_app().await;

    assert_eq!(signup(&app, "frank", "short").await, StatusCode::BAD_REQUEST);
    assert_eq!(signup(&app, "frank", "frank-password").await, StatusCode::CREATED);
    assert_eq!(signup(&app, "frank", "frank-password").await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_change_password_flow() {
    let app = spawn_app().await;

    assert_eq!(signup(&app, "grace", "first-password").await, StatusCode::CREATED);
    let cookie = login(&app, "grace", "first-password").await.unwrap();

    let change = |cookie: String, current: &str, new: &str| {
        let app = app.clone();
        let body = serde_json::json!({ "current_password": current, "new_password": new })
            .to_string();
        async move {
            app.oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/auth/password")
                    .header(header::COOKIE, cookie)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    let response = change(cookie.clone(), "wrong-password", "second-password").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = change(cookie.clone(), "first-password", "second-password").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(login(&app, "grace", "first-password").await.is_none());
    assert!(login(&app, "grace", "second-password").await.is_some());
}

#[tokio::test]
async fn test_deleted_user_token_is_anonymous() {
    let app = spawn_app().await;

    assert_eq!(signup(&app, "henry", "henry-password").await, StatusCode::CREATED);
    let henry_cookie = login(&app, "henry", "henry-password").await.unwrap();

    let admin_cookie = login(&app, ADMIN_USER, ADMIN_PASSWORD).await.unwrap();
    let response = get_with_cookie(&app, "/api/users", Some(&admin_cookie)).await;
    let body = body_json(response).await;
    let henry_id = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "henry")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/users/{henry_id}"))
                .header(header::COOKIE, admin_cookie.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["deleted"], true);

    // The still-valid token now points at a vanished user: the request
    // degrades to anonymous rather than erroring.
    let response = get_with_cookie(&app, "/api/users/me", Some(&henry_cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_with_cookie(&app, "/admin", Some(&henry_cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = spawn_app().await;

    let response = get_with_cookie(&app, "/api/system/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["database"], "ok");
}

#[tokio::test]
async fn test_unlisted_pages_are_public() {
    let app = spawn_app().await;

    let response = get_with_cookie(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
