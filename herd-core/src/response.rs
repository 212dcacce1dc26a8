//! Captured responses and the buffering adapter that produces them.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use std::time::{Duration, Instant};

/// A complete response recorded from a handler, replayable any number of times.
///
/// Never mutated after construction; the cache and the coalescing queue share
/// it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    captured_at: Instant,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(captured_at: Instant, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            captured_at,
            status,
            headers,
            body,
        }
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Time elapsed since capture. Zero if `now` precedes the capture.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    /// Age in whole seconds for the `Age` header: rounded up, never below 1.
    pub fn age_header_value(&self, now: Instant) -> u64 {
        let age = self.age(now);
        let secs = age.as_secs() + u64::from(age.subsec_nanos() > 0);
        secs.max(1)
    }

    /// True once the entry is strictly older than `ttl`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

/// Buffering stand-in for a response destination.
///
/// Records status, headers and body instead of sending them, so the result
/// can be stored and handed to any number of waiting requests.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status. The last call wins.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Status recorded so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Append body bytes, returning how many were written.
    pub fn write_body(&mut self, chunk: &[u8]) -> usize {
        self.body.extend_from_slice(chunk);
        chunk.len()
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Seal the capture. A status that was never set is replayed as 200.
    pub fn finish(self, now: Instant) -> CachedResponse {
        CachedResponse {
            captured_at: now,
            status: self.status.unwrap_or(StatusCode::OK),
            headers: self.headers,
            body: self.body.freeze(),
        }
    }
}
