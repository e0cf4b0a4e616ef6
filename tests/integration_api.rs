//! End-to-end exercise of the router against a real PostgreSQL.
//!
//! Set `ROSTER_TEST_DSN` to run; without it the suite is a no-op so that
//! `cargo test` stays green on machines without a database.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use roster::api;
use roster::cli::globals::GlobalArgs;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

const SCHEMA: &str = include_str!("../db/schema.sql");

async fn test_pool() -> Option<PgPool> {
    let dsn = std::env::var("ROSTER_TEST_DSN").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&dsn)
        .await
        .expect("connect to ROSTER_TEST_DSN");

    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .expect("apply schema");
        }
    }

    sqlx::query("TRUNCATE user_sessions, users")
        .execute(&pool)
        .await
        .expect("truncate tables");

    Some(pool)
}

fn router(pool: PgPool) -> Router {
    api::app(pool, GlobalArgs::new(86400), None).expect("build router")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("send request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, body)
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, path: &str, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sign up an account, promote it to admin directly in the store, and sign
/// back in so the session carries the admin role.
async fn admin_token(app: &Router, pool: &PgPool) -> String {
    let (status, _) = send(
        app,
        post_json(
            "/signup",
            &json!({"name": "Root", "email": "root@roster.fyi", "password": "sup3rsecret"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    sqlx::query(r#"UPDATE users SET doc = doc || '{"role": "admin"}' WHERE doc->>'email' = $1"#)
        .bind("root@roster.fyi")
        .execute(pool)
        .await
        .expect("promote admin");

    let (status, body) = send(
        app,
        post_json(
            "/signin",
            &json!({"email": "root@roster.fyi", "password": "sup3rsecret"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert!(body.get("code").is_none());
    body["token"].as_str().expect("token").to_string()
}

// Serialized as one flow: the suite shares one database.
#[tokio::test]
async fn api_end_to_end() {
    let Some(pool) = test_pool().await else {
        eprintln!("ROSTER_TEST_DSN not set, skipping");
        return;
    };
    let app = router(pool.clone());

    // Admin-gated routes refuse anonymous and non-admin callers.
    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/available")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        post_json(
            "/signup",
            &json!({"email": "plain@roster.fyi", "password": "n0tanadmin"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let plain_token = body["token"].as_str().expect("token").to_string();

    let (status, _) = send(&app, authed("GET", "/available", &plain_token, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = admin_token(&app, &pool).await;

    // Weak password fails validation before anything is persisted.
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/",
            &token,
            Some(&json!({"email": "weak@roster.fyi", "password": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["code"], json!("PASSWORD_NOT_VALIDATED"));

    let (status, body) = send(
        &app,
        authed("GET", "/?email=weak@roster.fyi", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    // Creation returns the document without the password digest.
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/",
            &token,
            Some(&json!({
                "name": "Ada",
                "email": "ada@roster.fyi",
                "password": "l0velace1",
                "role": "user",
                "availability": "available"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert!(body["data"].get("password").is_none());
    let ada_id = body["data"]["_id"].as_str().expect("id").to_string();

    // Duplicate email maps to 409.
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/",
            &token,
            Some(&json!({"email": "ada@roster.fyi", "password": "l0velace1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("USER_ALREADY_REGISTERED"));

    // Fetch by id needs no credential; an unknown id answers data: null.
    let (status, body) = send(
        &app,
        Request::builder()
            .uri(format!("/{ada_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("ada@roster.fyi"));

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/00000000-0000-0000-0000-000000000000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["data"], Value::Null);

    // A malformed id takes the server-error path.
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/definitely-not-a-uuid")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("SERVER_ERROR"));

    // Listing honors the verbatim query filter.
    let (status, body) = send(&app, authed("GET", "/?role=user", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body["data"].as_array().expect("array");
    assert!(listed
        .iter()
        .all(|user| user["role"] == json!("user")));
    assert!(listed
        .iter()
        .any(|user| user["email"] == json!("ada@roster.fyi")));

    // Availability listing excludes the sentinel and orders by last login.
    let (status, body) = send(
        &app,
        authed(
            "PUT",
            &format!("/{ada_id}"),
            &token,
            Some(&json!({"availability": "not available"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["user"]["availability"], json!("not available"));
    assert!(body["user"].get("password").is_none());

    let (status, body) = send(&app, authed("GET", "/available", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let available = body["data"].as_array().expect("array");
    assert!(available
        .iter()
        .all(|user| user["availability"] != json!("not available")));
    // Admin signed in last, plain user before that; descending order.
    assert_eq!(available[0]["email"], json!("root@roster.fyi"));

    // PUT / touches the caller's own record.
    let (status, body) = send(
        &app,
        authed("PUT", "/", &token, Some(&json!({"timezone": "UTC"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timezone"], json!("UTC"));
    assert_eq!(body["data"]["email"], json!("root@roster.fyi"));

    // A fresh token from an existing session.
    let (status, body) = send(&app, authed("GET", "/signin_token", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let second_token = body["token"].as_str().expect("token").to_string();
    assert_ne!(second_token, token);

    // Delete is idempotent: both calls answer 200 ok.
    let (status, body) = send(&app, authed("DELETE", &format!("/{ada_id}"), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (status, body) = send(&app, authed("DELETE", &format!("/{ada_id}"), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    // Logout drops the session; the token no longer opens the gate.
    let (status, body) = send(&app, authed("POST", "/logout", &second_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (status, _) = send(&app, authed("GET", "/available", &second_token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Logout with a dead token is still 200.
    let (status, body) = send(&app, authed("POST", "/logout", &second_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    // Wrong password and unknown user answer identically.
    let (status, body) = send(
        &app,
        post_json(
            "/signin",
            &json!({"email": "root@roster.fyi", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("EMAIL_OR_PASSWORD_INVALID"));

    let (status, body) = send(
        &app,
        post_json(
            "/signin",
            &json!({"email": "ghost@roster.fyi", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("EMAIL_OR_PASSWORD_INVALID"));
}
