//! Cache key construction.
//!
//! A [`CacheKey`] captures everything that can change the content of a GET
//! response: the caller identity, the resource path and query, and the
//! conditional/negotiation headers. Two requests with the same key are
//! interchangeable from the point of view of the response; two requests that
//! could receive different responses never share a key.
//!
//! # Encoding
//!
//! ```text
//! <tenant>,<role>,"<path>","<query>",<if-modified-since>,<if-match>,<if-none-match>,<accept-encoding>
//! ```
//!
//! Every string is quoted with `"` and `\` escaped and non-printable bytes
//! hex-escaped, so no field value can forge a delimiter. A header that is
//! absent is written as a bare `-`; a header with several values is written as
//! a `;`-separated list of quoted values.

use http::header::{HeaderName, ACCEPT_ENCODING, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, Uri};
use std::fmt;
use std::fmt::Write as _;

use crate::identity::Identity;

/// Request headers that participate in the key, in encoding order.
pub const KEY_HEADERS: [HeaderName; 4] = [IF_MODIFIED_SINCE, IF_MATCH, IF_NONE_MATCH, ACCEPT_ENCODING];

const FIELD_SEPARATOR: char = ',';
const VALUE_SEPARATOR: char = ';';
const ABSENT: char = '-';

/// Opaque, immutable cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    encoded: String,
    path: String,
}

impl CacheKey {
    /// Build a key from its parts.
    ///
    /// `raw_query` is the query string without the leading `?`; an absent
    /// query and an empty query are the same resource.
    pub fn new(identity: &Identity, path: &str, raw_query: &str, headers: &HeaderMap) -> Self {
        let mut encoded = String::with_capacity(64 + path.len() + raw_query.len());

        // Writing into a String cannot fail.
        let _ = write!(
            encoded,
            "{}{}{}",
            identity.tenant_id, FIELD_SEPARATOR, identity.role_id
        );

        encoded.push(FIELD_SEPARATOR);
        push_quoted(&mut encoded, path.as_bytes());
        encoded.push(FIELD_SEPARATOR);
        push_quoted(&mut encoded, raw_query.as_bytes());

        for name in &KEY_HEADERS {
            encoded.push(FIELD_SEPARATOR);
            push_header(&mut encoded, headers, name);
        }

        Self {
            encoded,
            path: path.to_string(),
        }
    }

    /// Build a key from the URI and headers of an HTTP request.
    pub fn from_http(identity: &Identity, uri: &Uri, headers: &HeaderMap) -> Self {
        Self::new(identity, uri.path(), uri.query().unwrap_or(""), headers)
    }

    /// The request path this key was built from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The full encoded key.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

fn push_header(out: &mut String, headers: &HeaderMap, name: &HeaderName) {
    let mut values = headers.get_all(name).iter().peekable();
    if values.peek().is_none() {
        out.push(ABSENT);
        return;
    }

    let mut first = true;
    for value in values {
        if !first {
            out.push(VALUE_SEPARATOR);
        }
        first = false;
        push_quoted(out, value.as_bytes());
    }
}

fn push_quoted(out: &mut String, bytes: &[u8]) {
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{RoleId, TenantId};
    use http::HeaderValue;

    fn tenant(id: i64) -> Identity {
        Identity::new(TenantId::new(id), RoleId::new(1))
    }

    #[test]
    fn test_same_inputs_same_key() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let a = CacheKey::new(&tenant(1), "/api/v1/servers", "cdn=2", &headers);
        let b = CacheKey::new(&tenant(1), "/api/v1/servers", "cdn=2", &headers);

        assert_eq!(a, b);
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_encoding_layout() {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_static("\"abc\""));

        let key = CacheKey::new(&tenant(4), "/a", "x=1", &headers);
        assert_eq!(key.as_str(), r#"4,1,"/a","x=1",-,"\"abc\"",-,-"#);
        assert_eq!(key.path(), "/a");
    }

    #[test]
    fn test_each_field_changes_key() {
        let base_headers = HeaderMap::new();
        let base = CacheKey::new(&tenant(1), "/a", "q=1", &base_headers);

        assert_ne!(base, CacheKey::new(&tenant(2), "/a", "q=1", &base_headers));
        assert_ne!(
            base,
            CacheKey::new(
                &Identity::new(TenantId::new(1), RoleId::new(2)),
                "/a",
                "q=1",
                &base_headers
            )
        );
        assert_ne!(base, CacheKey::new(&tenant(1), "/b", "q=1", &base_headers));
        assert_ne!(base, CacheKey::new(&tenant(1), "/a", "q=2", &base_headers));

        for name in &KEY_HEADERS {
            let mut headers = HeaderMap::new();
            headers.insert(name.clone(), HeaderValue::from_static("v"));
            assert_ne!(
                base,
                CacheKey::new(&tenant(1), "/a", "q=1", &headers),
                "header {} must partition the key",
                name
            );
        }
    }

    #[test]
    fn test_absent_and_empty_header_differ() {
        let absent = HeaderMap::new();
        let mut empty = HeaderMap::new();
        empty.insert(ACCEPT_ENCODING, HeaderValue::from_static(""));

        assert_ne!(
            CacheKey::new(&tenant(1), "/a", "", &absent),
            CacheKey::new(&tenant(1), "/a", "", &empty)
        );
    }

    #[test]
    fn test_quotes_cannot_forge_field_boundaries() {
        let headers = HeaderMap::new();
        // Without escaping, both of these would render as `"/a","b"`.
        let a = CacheKey::new(&tenant(1), "/a\",\"b", "", &headers);
        let b = CacheKey::new(&tenant(1), "/a", "b\",\"", &headers);
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_utf8_header_values_are_distinct() {
        let mut a = HeaderMap::new();
        a.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_bytes(&[0xff, 0x41]).expect("obs-text is a valid header byte"),
        );
        let mut b = HeaderMap::new();
        b.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_bytes(&[0xfe, 0x41]).expect("obs-text is a valid header byte"),
        );

        assert_ne!(
            CacheKey::new(&tenant(1), "/a", "", &a),
            CacheKey::new(&tenant(1), "/a", "", &b)
        );
    }

    #[test]
    fn test_multi_valued_header() {
        let mut one = HeaderMap::new();
        one.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip;br"));
        let mut two = HeaderMap::new();
        two.append(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        two.append(ACCEPT_ENCODING, HeaderValue::from_static("br"));

        assert_ne!(
            CacheKey::new(&tenant(1), "/a", "", &one),
            CacheKey::new(&tenant(1), "/a", "", &two)
        );
    }

    #[test]
    fn test_from_http_missing_query_matches_empty_query() {
        let headers = HeaderMap::new();
        let identity = tenant(9);
        let without: Uri = "/api/v1/cdns".parse().expect("valid uri");
        let with_empty: Uri = "/api/v1/cdns?".parse().expect("valid uri");

        assert_eq!(
            CacheKey::from_http(&identity, &without, &headers),
            CacheKey::from_http(&identity, &with_empty, &headers)
        );
    }

    #[test]
    fn test_irrelevant_headers_do_not_change_key() {
        let plain = HeaderMap::new();
        let mut noisy = HeaderMap::new();
        noisy.insert("user-agent", HeaderValue::from_static("curl/8"));
        noisy.insert("x-request-id", HeaderValue::from_static("abc"));

        assert_eq!(
            CacheKey::new(&tenant(1), "/a", "", &plain),
            CacheKey::new(&tenant(1), "/a", "", &noisy)
        );
    }
}
