//! # Authentication Module
//!
//! API key authentication and caller identity for the HTTP API.
//!
//! ## Configuration
//!
//! Authentication is configured via environment variable:
//! - `METAGRAPH_API_KEY`: If set, all requests (except /health) require this key
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! X-User-Id: <caller>
//! ```
//!
//! The API key gates the server; `X-User-Id` names the caller the store
//! authorizes and records as creator or updater.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use subtle::ConstantTimeEq;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

// =============================================================================
// CALLER IDENTITY
// =============================================================================

/// The caller named by `X-User-Id`.
///
/// A missing header yields an empty id, which the client rejects as an
/// invalid parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        Ok(Self(user))
    }
}

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Returns `Some(key)` if `METAGRAPH_API_KEY` is set and non-empty,
/// `None` otherwise (disabling authentication).
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("METAGRAPH_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Length-independent constant-time comparison.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    // Pad to a common length so ct_eq always covers the same number of bytes.
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// API key authentication middleware.
///
/// If `METAGRAPH_API_KEY` is set:
/// - `/health` is always allowed
/// - everything else requires `Authorization: Bearer <key>`
///
/// If it is not set, all requests are allowed.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if keys_match(provided.as_bytes(), expected.as_bytes()) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_exactly() {
        assert!(keys_match(b"secret", b"secret"));
        assert!(!keys_match(b"secret", b"secreT"));
        assert!(!keys_match(b"secret", b"secret-longer"));
        assert!(!keys_match(b"", b"secret"));
    }

    #[tokio::test]
    async fn user_id_is_trimmed_and_defaults_to_empty() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "  alice ")
            .body(())
            .expect("request");
        let (mut parts, ()) = request.into_parts();
        let UserId(user) = UserId::from_request_parts(&mut parts, &())
            .await
            .expect("infallible");
        assert_eq!(user, "alice");

        let (mut parts, ()) = Request::builder().body(()).expect("request").into_parts();
        let UserId(user) = UserId::from_request_parts(&mut parts, &())
            .await
            .expect("infallible");
        assert!(user.is_empty());
    }
}
