//! Document-style user store over PostgreSQL JSONB.
//!
//! User records are a UUID id plus an opaque JSONB document. Filters are
//! JSONB containment queries built from the caller's input verbatim; the
//! admin gate upstream is the trust boundary, not this module. Listings are
//! ordered by `last_login_at` descending; the field holds RFC3339 UTC text,
//! so text ordering is chronological.

use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Sentinel excluded by the availability listing.
pub const NOT_AVAILABLE: &str = "not available";

/// One stored user: id plus document.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub doc: Value,
}

impl UserRecord {
    /// API representation: the document with the id merged in as `_id`.
    /// The password digest never leaves the store through reads.
    #[must_use]
    pub fn into_document(self) -> Value {
        let mut doc = self.doc;
        if let Value::Object(map) = &mut doc {
            map.remove("password");
            map.insert("_id".to_string(), Value::String(self.id.to_string()));
        }
        doc
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        doc: row.get("doc"),
    }
}

/// List users matching a verbatim containment filter, last-login descending.
pub async fn find_users(pool: &PgPool, filter: &Value) -> Result<Vec<UserRecord>, sqlx::Error> {
    let query = r"
        SELECT id, doc
        FROM users
        WHERE doc @> $1
        ORDER BY doc->>'last_login_at' DESC NULLS LAST
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(filter)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(record_from_row).collect())
}

/// List users whose availability is not the "not available" sentinel.
pub async fn find_available(pool: &PgPool) -> Result<Vec<UserRecord>, sqlx::Error> {
    let query = r"
        SELECT id, doc
        FROM users
        WHERE doc->>'availability' IS DISTINCT FROM $1
        ORDER BY doc->>'last_login_at' DESC NULLS LAST
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(NOT_AVAILABLE)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(record_from_row).collect())
}

/// Fetch a single user by id.
pub async fn find_user(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = "SELECT id, doc FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(record_from_row))
}

/// Create a user from the given attributes.
///
/// A duplicate email surfaces as a unique violation (SQLSTATE 23505) for the
/// caller to map; any other failure is returned untouched.
pub async fn insert_user(pool: &PgPool, attrs: &Value) -> Result<UserRecord, sqlx::Error> {
    let query = r#"
        INSERT INTO users (id, doc)
        VALUES ($1, $2 || jsonb_build_object(
            'created_at', to_char(NOW() AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
        ))
        RETURNING id, doc
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(attrs)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(record_from_row(&row))
}

/// Merge attributes into the user's document and return the updated record.
pub async fn update_user(
    pool: &PgPool,
    id: Uuid,
    attrs: &Value,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = r"
        UPDATE users
        SET doc = doc || $2
        WHERE id = $1
        RETURNING id, doc
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(attrs)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(record_from_row))
}

/// Remove a user by id. Removing zero records is not an error.
pub async fn remove_user(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

/// Stamp the user's `last_login_at` and return the updated record.
pub async fn touch_last_login(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = r#"
        UPDATE users
        SET doc = doc || jsonb_build_object(
            'last_login_at', to_char(NOW() AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
        )
        WHERE id = $1
        RETURNING id, doc
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(record_from_row))
}

/// Seed a bootstrap admin unless a user with that email already exists.
///
/// Returns whether a row was inserted.
pub async fn ensure_admin(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let query = r#"
        INSERT INTO users (id, doc)
        VALUES ($1, jsonb_build_object(
            'email', $2::text,
            'password', $3::text,
            'role', 'admin',
            'availability', 'available',
            'created_at', to_char(NOW() AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
        ))
        ON CONFLICT ((doc->>'email')) DO NOTHING
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}
