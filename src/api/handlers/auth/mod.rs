//! Auth endpoints: sign-in, sign-up, logout, and token-based sign-in.
//!
//! Flow Overview:
//! 1) Validate the payload (format only; strength checks on signup).
//! 2) Check credentials against the stored digest.
//! 3) Mint or drop an opaque bearer session and answer with the envelope.
//!
//! These handlers fully own their HTTP responses; the user endpoint set
//! only delegates to them.

pub mod principal;
pub(crate) mod storage;
pub(crate) mod utils;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::debug;
use utoipa::ToSchema;

use crate::api::handlers::envelope::{Envelope, ErrorCode};
use crate::api::report::capture;
use crate::api::storage::{find_user, insert_user, touch_last_login, UserRecord};
use crate::cli::globals::GlobalArgs;
use principal::require_admin;
use storage::{delete_session, insert_session, lookup_credentials};
use utils::{
    extract_bearer_token, hash_password, hash_session_token, normalize_email, valid_email,
    validate_password,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    name: Option<String>,
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in; envelope carries token and user", body = Envelope),
        (status = 400, description = "Missing email or password", body = Envelope),
        (status = 401, description = "Unknown user or wrong password", body = Envelope),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "auth"
)]
pub async fn signin(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<SigninRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return required_response();
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return required_response();
    }

    let record = match lookup_credentials(&pool, &email).await {
        Ok(Some(record)) => record,
        Ok(None) => return invalid_response(),
        Err(err) => return server_error(&err),
    };

    // Unknown user and wrong password are indistinguishable on purpose.
    let candidate = hash_password(&request.password);
    if record.password_hash.as_deref() != Some(candidate.as_str()) {
        return invalid_response();
    }

    let token = match insert_session(&pool, record.user_id, globals.session_ttl_seconds).await {
        Ok(token) => token,
        Err(err) => return server_error(&err),
    };

    match touch_last_login(&pool, record.user_id).await {
        Ok(user) => {
            debug!(email = %email, "signin successful");
            let data = user.map_or(Value::Null, UserRecord::into_document);
            (StatusCode::OK, Json(Envelope::token(token, data))).into_response()
        }
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created; envelope carries token and user", body = Envelope),
        (status = 400, description = "Missing email or weak password", body = Envelope),
        (status = 409, description = "Email already registered", body = Envelope),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "auth"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return required_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) || request.password.is_empty() {
        return required_response();
    }

    if !validate_password(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::fail(ErrorCode::PasswordNotValidated)),
        )
            .into_response();
    }

    let mut attrs = json!({
        "email": email,
        "password": hash_password(&request.password),
        "role": "user",
        "availability": "available",
    });
    if let (Value::Object(map), Some(name)) = (&mut attrs, request.name) {
        map.insert("name".to_string(), Value::String(name));
    }

    let user = match insert_user(&pool, &attrs).await {
        Ok(user) => user,
        Err(err) if utils::is_unique_violation(&err) => {
            return (
                StatusCode::CONFLICT,
                Json(Envelope::fail(ErrorCode::UserAlreadyRegistered)),
            )
                .into_response();
        }
        Err(err) => return server_error(&err),
    };

    match insert_session(&pool, user.id, globals.session_ttl_seconds).await {
        Ok(token) => {
            debug!(email = %email, "signup successful");
            (
                StatusCode::OK,
                Json(Envelope::token(token, user.into_document())),
            )
                .into_response()
        }
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session cleared (idempotent)", body = Envelope),
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, pool: Extension<PgPool>) -> Response {
    if let Some(token) = extract_bearer_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            // Best effort: the client is logged out either way.
            capture(&err);
        }
    }

    (StatusCode::OK, Json(Envelope::ok())).into_response()
}

#[utoipa::path(
    get,
    path = "/signin_token",
    responses(
        (status = 200, description = "Fresh token for the authenticated admin", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "auth"
)]
pub async fn signin_token(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let token = match insert_session(&pool, principal.user_id, globals.session_ttl_seconds).await {
        Ok(token) => token,
        Err(err) => return server_error(&err),
    };

    match find_user(&pool, principal.user_id).await {
        Ok(user) => {
            let data = user.map_or(Value::Null, UserRecord::into_document);
            (StatusCode::OK, Json(Envelope::token(token, data))).into_response()
        }
        Err(err) => server_error(&err),
    }
}

fn required_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(Envelope::fail(ErrorCode::EmailAndPasswordRequired)),
    )
        .into_response()
}

fn invalid_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(Envelope::fail(ErrorCode::EmailOrPasswordInvalid)),
    )
        .into_response()
}

fn server_error<E: std::fmt::Display>(err: &E) -> Response {
    capture(err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Envelope::fail_with(
            ErrorCode::ServerError,
            json!(err.to_string()),
        )),
    )
        .into_response()
}
