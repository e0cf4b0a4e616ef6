//! Database helpers for sessions and credentials.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Minimal data resolved from a valid bearer credential.
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) role: Option<String>,
}

/// Credential data needed to check a sign-in attempt.
pub(crate) struct CredentialRecord {
    pub(crate) user_id: Uuid,
    pub(crate) password_hash: Option<String>,
}

/// Look up sign-in data by normalized email.
pub(crate) async fn lookup_credentials(
    pool: &PgPool,
    email: &str,
) -> Result<Option<CredentialRecord>> {
    let query = "SELECT id, doc->>'password' AS password FROM users WHERE doc->>'email' = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        user_id: row.get("id"),
        password_hash: row.get("password"),
    }))
}

/// Mint a session and return the raw token for the client.
pub(crate) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can hand it to the client.
    let query = r"
        INSERT INTO user_sessions (session_hash, user_id, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

/// Resolve a token hash into the owning user, ignoring expired sessions.
pub(crate) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT users.id, users.doc->>'email' AS email, users.doc->>'role' AS role
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        email: row.get::<Option<String>, _>("email").unwrap_or_default(),
        role: row.get("role"),
    }))
}

/// Logout is idempotent; it's fine if no rows are deleted.
pub(crate) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CredentialRecord, SessionRecord};
    use uuid::Uuid;

    #[test]
    fn session_record_holds_values() {
        let record = SessionRecord {
            user_id: Uuid::nil(),
            email: "a@b.co".to_string(),
            role: Some("admin".to_string()),
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert_eq!(record.email, "a@b.co");
        assert_eq!(record.role.as_deref(), Some("admin"));
    }

    #[test]
    fn credential_record_allows_missing_hash() {
        let record = CredentialRecord {
            user_id: Uuid::nil(),
            password_hash: None,
        };
        assert!(record.password_hash.is_none());
    }
}
