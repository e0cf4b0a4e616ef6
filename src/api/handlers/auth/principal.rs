//! Authenticated principal extraction and the admin gate.
//!
//! Flow Overview: read the bearer credential, resolve it to a user, and
//! return a principal that downstream handlers can use. Protected handlers
//! compose `require_admin` in front of their own logic; rejections are
//! status-only responses owned by this gate, not the endpoint envelope.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::storage::lookup_session;
use super::utils::{extract_bearer_token, hash_session_token};

const ADMIN_ROLE: &str = "admin";

/// Authenticated user context derived from the bearer credential.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Option<String>,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Resolve the bearer credential into a principal, or 401 when missing.
pub async fn require_auth(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    match lookup_session(pool, &token_hash).await {
        Ok(Some(record)) => Ok(Principal {
            user_id: record.user_id,
            email: record.email,
            role: record.role,
        }),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Admin gate for protected routes: 401 without a valid session, 403 for
/// non-admin principals.
pub async fn require_admin(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    let principal = require_auth(headers, pool).await?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}
