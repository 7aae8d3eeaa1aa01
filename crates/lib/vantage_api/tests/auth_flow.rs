//! Router-level tests for the auth endpoints, backed by in-memory stores.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;
use vantage_api::AppState;
use vantage_api::config::ApiConfig;

fn app() -> (AppState, Router) {
    let state = AppState::in_memory(ApiConfig::for_testing()).expect("state");
    let app = vantage_api::router(state.clone());
    (state, app)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("request")
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn set_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("Set-Cookie header")
        .to_string()
}

/// `name=value` part of a `Set-Cookie` header.
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string()
}

async fn register(app: &Router, email: &str, role: &str) -> (String, Value) {
    let response = send(
        app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "email": email, "password": "hunter22", "name": "Test User", "role": role }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let token = body["accessToken"].as_str().expect("accessToken").to_string();
    (token, body["user"].clone())
}

async fn login(app: &Router, email: &str, password: &str) -> Response {
    send(
        app,
        json_request(
            "POST",
            "/auth/login",
            json!({ "email": email, "password": password }),
        ),
    )
    .await
}

#[tokio::test]
async fn health_is_public() {
    let (_, app) = app();
    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn register_defaults_to_viewer_and_sets_cookie() {
    let (_, app) = app();
    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "email": "  Ada@Example.com ", "password": "hunter22", "name": "Ada" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("vantage_refresh="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(!cookie.contains("Secure"), "development cookies are not Secure");

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "viewer");
    assert_eq!(body["user"]["isActive"], true);
    assert!(body["accessToken"].is_string());
    assert!(body.get("refreshToken").is_none());
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn register_validation_errors() {
    let (_, app) = app();

    let cases = [
        json!({ "email": "a@example.com", "password": "short", "name": "A" }),
        json!({ "email": "a@example.com", "password": "hunter22", "name": "A", "role": "owner" }),
        json!({ "email": "a@example.com", "password": "hunter22" }),
        json!({ "password": "hunter22", "name": "A" }),
        json!({ "email": "not-an-email", "password": "hunter22", "name": "A" }),
    ];
    for case in cases {
        let response = send(&app, json_request("POST", "/auth/register", case.clone())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "case: {case}");
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error", "case: {case}");
    }
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let (_, app) = app();

    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "email": 5, "password": "hunter22", "name": "A" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].is_string());

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .body(Body::from(
            json!({ "email": "a@example.com", "password": "hunter22" }).to_string(),
        ))
        .unwrap();
    let response = send(&app, no_content_type).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (_, app) = app();
    register(&app, "dup@example.com", "viewer").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            json!({ "email": "DUP@example.com", "password": "hunter22", "name": "Again" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "conflict");
}

#[tokio::test]
async fn login_returns_access_token_and_cookie() {
    let (_, app) = app();
    register(&app, "ada@example.com", "manager").await;

    let response = login(&app, "ADA@example.com", "hunter22").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=604800"));

    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "manager");
    assert!(body["user"]["lastLoginAt"].is_string());
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let (_, app) = app();
    register(&app, "ada@example.com", "viewer").await;

    let wrong_password = login(&app, "ada@example.com", "nope-nope").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let wrong_password = body_json(wrong_password).await;

    let unknown = login(&app, "ghost@example.com", "hunter22").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown = body_json(unknown).await;

    assert_eq!(wrong_password["message"], "Invalid credentials");
    assert_eq!(wrong_password["message"], unknown["message"]);
}

#[tokio::test]
async fn login_requires_both_fields() {
    let (_, app) = app();
    let response = send(
        &app,
        json_request("POST", "/auth/login", json!({ "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_requires_a_valid_access_token() {
    let (_, app) = app();
    let (token, user) = register(&app, "ada@example.com", "viewer").await;

    let response = send(
        &app,
        Request::builder().uri("/auth/me").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Not authorized, no token");

    let response = send(&app, bearer_request("GET", "/auth/me", "garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["message"],
        "Not authorized, token failed"
    );

    let response = send(&app, bearer_request("GET", "/auth/me", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["id"], user["id"]);
}

#[tokio::test]
async fn me_for_a_missing_subject_is_not_found() {
    let (state, app) = app();
    let ghost = state
        .tokens
        .issue_pair(uuid::Uuid::new_v4())
        .expect("issue pair");

    let response = send(&app, bearer_request("GET", "/auth/me", &ghost.access_token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let (state, app) = app();
    let (_, user) = register(&app, "ada@example.com", "viewer").await;
    let id: uuid::Uuid = user["id"].as_str().unwrap().parse().unwrap();
    let pair = state.tokens.issue_pair(id).unwrap();

    let response = send(&app, bearer_request("GET", "/auth/me", &pair.refresh_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_via_cookie_rotates_pair() {
    let (_, app) = app();
    register(&app, "ada@example.com", "viewer").await;
    let response = login(&app, "ada@example.com", "hunter22").await;
    let cookie = cookie_pair(&set_cookie(&response));

    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).starts_with("vantage_refresh="));

    let body = body_json(response).await;
    let access = body["accessToken"].as_str().expect("accessToken");
    assert!(body.get("refreshToken").is_none());

    let response = send(&app, bearer_request("GET", "/auth/me", access)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_via_body_returns_refresh_token() {
    let (state, app) = app();
    let (_, user) = register(&app, "ada@example.com", "viewer").await;
    let id: uuid::Uuid = user["id"].as_str().unwrap().parse().unwrap();
    let pair = state.tokens.issue_pair(id).unwrap();

    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/refresh",
            json!({ "refreshToken": pair.refresh_token }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
}

#[tokio::test]
async fn refresh_rejects_missing_and_wrong_kind_tokens() {
    let (state, app) = app();
    let (access, user) = register(&app, "ada@example.com", "viewer").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/refresh")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "No refresh token");

    let response = send(
        &app,
        json_request("POST", "/auth/refresh", json!({ "refreshToken": access })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A refresh token for a user that no longer exists.
    let id: uuid::Uuid = user["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(state.tokens.verify_access(&access).unwrap(), id);
    let orphan = state.tokens.issue_pair(uuid::Uuid::new_v4()).unwrap();
    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/refresh",
            json!({ "refreshToken": orphan.refresh_token }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie_without_auth() {
    let (_, app) = app();
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("vantage_refresh=;"));
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(body_json(response).await["success"], true);
}

#[tokio::test]
async fn viewer_is_forbidden_from_admin_routes() {
    let (_, app) = app();
    let (viewer_token, viewer) = register(&app, "viewer@example.com", "viewer").await;
    let (_, other) = register(&app, "other@example.com", "viewer").await;

    let uri = format!("/users/{}/status", other["id"].as_str().unwrap());
    let response = send(&app, bearer_request("PATCH", &uri, &viewer_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["message"],
        "Role 'viewer' is not authorized to access this resource"
    );

    let response = send(&app, bearer_request("GET", "/activity", &viewer_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let uri = format!("/users/{}/status", viewer["id"].as_str().unwrap());
    let response = send(
        &app,
        Request::builder()
            .method("PATCH")
            .uri(&uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_users_cannot_sign_in_or_refresh() {
    let (state, app) = app();
    let (admin_token, admin) = register(&app, "admin@example.com", "admin").await;
    let (_, viewer) = register(&app, "viewer@example.com", "viewer").await;
    let viewer_id: uuid::Uuid = viewer["id"].as_str().unwrap().parse().unwrap();
    let viewer_pair = state.tokens.issue_pair(viewer_id).unwrap();

    let uri = format!("/users/{viewer_id}/status");
    let response = send(&app, bearer_request("PATCH", &uri, &admin_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["isActive"], false);

    let response = login(&app, "viewer@example.com", "hunter22").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Account deactivated");

    let response = send(
        &app,
        json_request(
            "POST",
            "/auth/refresh",
            json!({ "refreshToken": viewer_pair.refresh_token }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Admins cannot toggle themselves.
    let uri = format!("/users/{}/status", admin["id"].as_str().unwrap());
    let response = send(&app, bearer_request("PATCH", &uri, &admin_token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn activity_is_recorded_for_auth_events() {
    let (state, app) = app();
    let (manager_token, manager) = register(&app, "boss@example.com", "manager").await;
    login(&app, "boss@example.com", "hunter22").await;
    send(&app, bearer_request("POST", "/auth/logout", &manager_token)).await;
    state.activity.flush().await;

    let response = send(&app, bearer_request("GET", "/activity?limit=10", &manager_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let actions: Vec<&str> = body["activities"]
        .as_array()
        .expect("activities")
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["logout", "login", "create"]);
    assert!(
        body["activities"]
            .as_array()
            .unwrap()
            .iter()
            .all(|a| a["userId"] == manager["id"] && a["ipAddress"] == "unknown")
    );
}

#[tokio::test]
async fn concurrent_requests_share_one_token() {
    let (_, app) = app();
    let (token, _) = register(&app, "ada@example.com", "viewer").await;

    let calls = (0..16).map(|_| send(&app, bearer_request("GET", "/auth/me", &token)));
    let responses = futures::future::join_all(calls).await;
    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));
}
