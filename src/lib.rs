//! # Roster (User Account Management API)
//!
//! `roster` manages user accounts for a web backend: sign-in, sign-up,
//! logout, token-based sign-in, and admin-gated CRUD on user records.
//!
//! ## Users as documents
//!
//! User records are JSONB documents keyed by a UUID. Beyond a handful of
//! well-known fields (`email`, `password`, `availability`, `last_login_at`,
//! `role`) the document is opaque: admin creation and updates merge request
//! bodies verbatim, and list filters are passed straight to the store as
//! JSONB containment queries. The trust boundary is the admin gate, not the
//! filter.
//!
//! ## Response envelope
//!
//! Every endpoint answers with `{ok, data|user|token|code|error}`. Failures
//! always carry a `code` (`SERVER_ERROR`, `USER_ALREADY_REGISTERED`,
//! `PASSWORD_NOT_VALIDATED`, plus the auth-owned sign-in codes) and never
//! escape to the framework's default error handler.
//!
//! ## Authentication
//!
//! Sessions are opaque bearer tokens; the database stores only a SHA-256
//! hash. Admin-only routes resolve the token to a principal and require the
//! `admin` role before touching the store.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
