//! Bearer credential helpers shared by protected routes.

use axum::http::{HeaderMap, header::AUTHORIZATION};

const BEARER_PREFIX: &str = "Bearer ";

/// Reads the token out of an `Authorization: Bearer <token>` header.
///
/// Returns `None` when the header is missing, not valid UTF-8, uses another
/// scheme, or carries an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();

    if token.is_empty() { None } else { Some(token) }
}
