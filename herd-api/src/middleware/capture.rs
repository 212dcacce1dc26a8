//! Capture and replay of axum responses.
//!
//! The leader's response is buffered into a [`CachedResponse`] so that the
//! same status, headers and body can be written to the leader's client, every
//! follower, and later cache hits.

use axum::{
    body::{Body, HttpBody},
    http::{header::AGE, HeaderValue},
    response::Response,
};
use herd_core::{CachedResponse, HerdError, HerdResult, ResponseCapture};
use std::time::Instant;

/// Result of trying to capture a response.
#[derive(Debug)]
pub enum Captured {
    /// Fully buffered and safe to share.
    Complete(CachedResponse),
    /// Body size unknown or above the limit. The response is returned
    /// untouched and must not be cached.
    Passthrough(Response),
}

/// Buffer `response` into a [`CachedResponse`] stamped with `now`.
///
/// Only bodies whose exact size is known up front and does not exceed
/// `max_body_bytes` are buffered; anything else is handed back as
/// [`Captured::Passthrough`] without reading it.
pub async fn capture_response(
    response: Response,
    max_body_bytes: usize,
    now: Instant,
) -> HerdResult<Captured> {
    let size_hint = response.body().size_hint();
    let within_limit = size_hint
        .exact()
        .and_then(|len| usize::try_from(len).ok())
        .is_some_and(|len| len <= max_body_bytes);

    if !within_limit {
        tracing::debug!(
            lower = size_hint.lower(),
            upper = ?size_hint.upper(),
            max_body_bytes,
            "Response body not cacheable, passing through"
        );
        return Ok(Captured::Passthrough(response));
    }

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| HerdError::Capture {
            reason: format!("Failed to read response body: {}", e),
        })?;

    let mut capture = ResponseCapture::new();
    capture.set_status(parts.status);
    *capture.headers_mut() = parts.headers;
    capture.write_body(&bytes);

    Ok(Captured::Complete(capture.finish(now)))
}

/// Build a response from a captured one, optionally adding an `Age` header.
pub fn replay(entry: &CachedResponse, age_secs: Option<u64>) -> Response {
    let mut response = Response::new(Body::from(entry.body().clone()));
    *response.status_mut() = entry.status();
    *response.headers_mut() = entry.headers().clone();

    if let Some(age) = age_secs {
        response.headers_mut().insert(AGE, HeaderValue::from(age));
    }

    response
}
