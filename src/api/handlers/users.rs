//! Admin-gated CRUD over user records.
//!
//! Flow Overview:
//! 1) Gate the request with `require_admin` where the route demands it.
//! 2) Make exactly one store call — no transactions, no retries.
//! 3) Answer with the `{ok, ...}` envelope; failures are captured and
//!    mapped, never left to the framework's default handler.
//!
//! Password strength is checked on creation only. Updates merge the body
//! verbatim, so they bypass both validation and credential hashing; that
//! asymmetry is intentional and load-bearing for compatibility.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::handlers::envelope::{Envelope, ErrorCode};
use crate::api::report::capture;
use crate::api::storage;
use crate::api::storage::UserRecord;

use super::auth::principal::require_admin;
use super::auth::utils::{hash_password, is_unique_violation, validate_password};

#[utoipa::path(
    get,
    path = "/available",
    responses(
        (status = 200, description = "Users not marked 'not available', last-login descending", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn available(headers: HeaderMap, pool: Extension<PgPool>) -> Response {
    let _principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match storage::find_available(&pool).await {
        Ok(users) => ok_data(documents(users)),
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User document, or data: null when unknown", body = Envelope),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn get_user(Path(id): Path<String>, pool: Extension<PgPool>) -> Response {
    // An unparseable id takes the same path as any store failure, matching
    // the behavior of catching the store's cast error.
    let user_id = match parse_id(&id) {
        Ok(user_id) => user_id,
        Err(err) => return server_error(&err),
    };

    match storage::find_user(&pool, user_id).await {
        Ok(user) => ok_data(user.map_or(Value::Null, UserRecord::into_document)),
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    post,
    path = "/",
    responses(
        (status = 200, description = "User created", body = Envelope),
        (status = 400, description = "Password failed validation", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 409, description = "Identifier already registered", body = Envelope),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn create_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<Value>>,
) -> Response {
    let _principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let body = payload.map_or(Value::Null, |Json(body)| body);

    // Validation happens before any persistence call.
    let password = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !validate_password(&password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(Envelope::fail(ErrorCode::PasswordNotValidated)),
        )
            .into_response();
    }

    let mut attrs = Value::Object(as_object_or_empty(body));
    if let Value::Object(map) = &mut attrs {
        map.insert(
            "password".to_string(),
            Value::String(hash_password(&password)),
        );
    }

    match storage::insert_user(&pool, &attrs).await {
        Ok(user) => ok_data(user.into_document()),
        Err(err) if is_unique_violation(&err) => (
            StatusCode::CONFLICT,
            Json(Envelope::fail(ErrorCode::UserAlreadyRegistered)),
        )
            .into_response(),
        Err(err) => {
            capture(&err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::fail(ErrorCode::ServerError)),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Users matching the query filter, last-login descending", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    pool: Extension<PgPool>,
) -> Response {
    let _principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    // The filter is passed through verbatim; the admin gate above is the
    // trust boundary.
    let filter = filter_from_query(&params);
    match storage::find_users(&pool, &filter).await {
        Ok(users) => ok_data(documents(users)),
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    put,
    path = "/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Updated user under the 'user' key", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn update_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<Value>>,
) -> Response {
    let _principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let user_id = match parse_id(&id) {
        Ok(user_id) => user_id,
        Err(err) => return server_error(&err),
    };

    let attrs = Value::Object(as_object_or_empty(
        payload.map_or(Value::Null, |Json(body)| body),
    ));

    match storage::update_user(&pool, user_id, &attrs).await {
        Ok(user) => {
            let user = user.map_or(Value::Null, UserRecord::into_document);
            (StatusCode::OK, Json(Envelope::user(user))).into_response()
        }
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    put,
    path = "/",
    responses(
        (status = 200, description = "Principal's own record updated", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn update_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<Value>>,
) -> Response {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let attrs = Value::Object(as_object_or_empty(
        payload.map_or(Value::Null, |Json(body)| body),
    ));

    // Always the principal's own record; there is no id parameter here.
    match storage::update_user(&pool, principal.user_id, &attrs).await {
        Ok(user) => ok_data(user.map_or(Value::Null, UserRecord::into_document)),
        Err(err) => server_error(&err),
    }
}

#[utoipa::path(
    delete,
    path = "/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Removed (also when nothing matched)", body = Envelope),
        (status = 401, description = "Missing or invalid bearer credential"),
        (status = 403, description = "Principal is not an admin"),
        (status = 500, description = "Server error", body = Envelope),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> Response {
    let _principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let user_id = match parse_id(&id) {
        Ok(user_id) => user_id,
        Err(err) => return server_error(&err),
    };

    match storage::remove_user(&pool, user_id).await {
        Ok(()) => (StatusCode::OK, Json(Envelope::ok())).into_response(),
        Err(err) => server_error(&err),
    }
}

fn parse_id(id: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(id.trim())
}

/// Query parameters become a flat containment filter, verbatim.
fn filter_from_query(params: &HashMap<String, String>) -> Value {
    let map: Map<String, Value> = params
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    Value::Object(map)
}

fn as_object_or_empty(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn documents(users: Vec<UserRecord>) -> Value {
    Value::Array(users.into_iter().map(UserRecord::into_document).collect())
}

fn ok_data(data: Value) -> Response {
    (StatusCode::OK, Json(Envelope::data(data))).into_response()
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
