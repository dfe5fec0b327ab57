use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use riskstore::app::build_app;
use riskstore::config::JwtConfig;
use riskstore::state::AppState;
use riskstore::store::{SqliteStore, Store};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// ─── Test helpers ───────────────────────────────────────────────────────

async fn test_app() -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::open(&tmp.path().join("api.db"), 4).await.unwrap();
    store.init_schema().await.unwrap();
    let jwt = JwtConfig {
        secret: "test-secret".into(),
        issuer: "riskstore".into(),
        audience: "riskstore-clients".into(),
        ttl_minutes: 5,
    };
    let app = build_app(AppState::from_parts(Arc::new(store), &jwt));
    (tmp, app)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    req.body(Body::empty()).unwrap()
}

async fn register_and_login(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        post_json(
            "/api/v1/auth/register",
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "hunter22",
                "full_name": "Test User",
            }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        post_json(
            "/api/v1/auth/login",
            json!({ "username": username, "password": "hunter22" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

fn sample_prediction(glucose: f64, label: i32) -> Value {
    json!({
        "pregnancies": 1,
        "glucose": glucose,
        "blood_pressure": 66.0,
        "skin_thickness": 29.0,
        "insulin": 0.0,
        "bmi": 26.6,
        "diabetes_pedigree_function": 0.351,
        "age": 31,
        "prediction": label,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let (_tmp, app) = test_app().await;
    let (status, body) = send(&app, get("/api/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let (_tmp, app) = test_app().await;
    register_and_login(&app, "alice").await;

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            json!({ "username": "alice", "email": "new@example.com", "password": "x" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            json!({ "username": "bob", "email": "not-an-email", "password": "x" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_look_the_same() {
    let (_tmp, app) = test_app().await;
    register_and_login(&app, "alice").await;

    let (s1, b1) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            json!({ "username": "alice", "password": "wrong" }),
            None,
        ),
    )
    .await;
    let (s2, b2) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            json!({ "username": "nobody", "password": "hunter22" }),
            None,
        ),
    )
    .await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(b1, b2);
}

#[tokio::test]
async fn me_requires_a_token() {
    let (_tmp, app) = test_app().await;
    let (status, _) = send(&app, get("/api/v1/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/v1/me", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = register_and_login(&app, "carol").await;
    let (status, body) = send(&app, get("/api/v1/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "carol");
    assert_eq!(body["email"], "carol@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn predictions_are_private_and_newest_first() {
    let (_tmp, app) = test_app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    for (glucose, label) in [(85.0, 0), (183.0, 1)] {
        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/predictions",
                sample_prediction(glucose, label),
                Some(&alice),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].as_i64().unwrap() > 0);
    }

    let (status, body) = send(&app, get("/api/v1/predictions", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["glucose"], 183.0);
    assert_eq!(rows[0]["prediction"], 1);
    assert_eq!(rows[1]["prediction"], 0);

    let (_, body) = send(&app, get("/api/v1/predictions", Some(&bob))).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_label_is_rejected() {
    let (_tmp, app) = test_app().await;
    let token = register_and_login(&app, "dave").await;
    let (status, _) = send(
        &app,
        post_json("/api/v1/predictions", sample_prediction(120.0, 2), Some(&token)),
    )
    .await;
    assert!(status.is_client_error(), "{status}");
}
