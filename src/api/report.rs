//! Fire-and-forget diagnostic sink for caught handler failures.

use std::fmt::Display;
use tracing::error;

/// Report a caught error for diagnostics.
///
/// Never affects the response already being constructed; the caller keeps
/// building its envelope regardless of what happens here.
pub fn capture<E: Display + ?Sized>(err: &E) {
    error!(target: "roster::report", error = %err, "captured handler error");
}
