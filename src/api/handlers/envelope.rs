//! The uniform `{ok, data|code|error}` response shape.
//!
//! Invariants are enforced by construction: `ok: false` always carries a
//! `code`, and `ok: true` can never carry one.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Error codes surfaced in failure envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Any uncaught persistence or runtime failure.
    ServerError,
    /// Duplicate-key conflict on creation.
    UserAlreadyRegistered,
    /// Password rejected before any persistence call.
    PasswordNotValidated,
    /// Sign-in payload missing email or password.
    EmailAndPasswordRequired,
    /// Unknown user or wrong password (indistinguishable on purpose).
    EmailOrPasswordInvalid,
}

/// JSON body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Only `PUT /{id}` reports its result under `user` instead of `data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl Envelope {
    /// `{ok: true}` with no payload.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            ok: true,
            data: None,
            user: None,
            token: None,
            code: None,
            error: None,
        }
    }

    /// `{ok: true, data}`. Pass `Value::Null` for an explicit `data: null`.
    #[must_use]
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    /// `{ok: true, user}`.
    #[must_use]
    pub fn user(user: Value) -> Self {
        Self {
            user: Some(user),
            ..Self::ok()
        }
    }

    /// `{ok: true, token, data}` for auth responses.
    #[must_use]
    pub fn token(token: String, data: Value) -> Self {
        Self {
            token: Some(token),
            data: Some(data),
            ..Self::ok()
        }
    }

    /// `{ok: false, code}`.
    #[must_use]
    pub fn fail(code: ErrorCode) -> Self {
        Self {
            ok: false,
            data: None,
            user: None,
            token: None,
            code: Some(code),
            error: None,
        }
    }

    /// `{ok: false, code, error}` with raw diagnostics attached.
    #[must_use]
    pub fn fail_with(code: ErrorCode, error: Value) -> Self {
        Self {
            error: Some(error),
            ..Self::fail(code)
        }
    }
}
