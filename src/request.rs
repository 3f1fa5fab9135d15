// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! Framework-neutral view of an HTTP request.
//!
//! The core signs and verifies against method, path, query and body only.
//! Framework middleware builds a [`RequestContext`] from whatever request
//! type it owns; note the body must already be fully buffered — re-reading
//! a streamed body is the adapter's responsibility, not this crate's.

/// Borrowed view of the request fields covered by a signature.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// HTTP method, uppercase (`GET`, `POST`, ...).
    pub method: &'a str,
    /// Absolute URL path, as sent on the wire.
    pub path: &'a str,
    /// Raw query string without the leading `?`, if any.
    pub query: Option<&'a str>,
    /// Request body. An absent body is an empty slice; the protocol does
    /// not distinguish the two.
    pub body: &'a [u8],
}

impl<'a> RequestContext<'a> {
    pub fn new(method: &'a str, path: &'a str, query: Option<&'a str>, body: &'a [u8]) -> Self {
        Self {
            method,
            path,
            query,
            body,
        }
    }

    /// Build a context from decomposed `http` request parts and a buffered
    /// body.
    pub fn from_parts(parts: &'a http::request::Parts, body: &'a [u8]) -> Self {
        Self {
            method: parts.method.as_str(),
            path: parts.uri.path(),
            query: parts.uri.query(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_splits_path_and_query() {
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/v1/things?b=2&a=1")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let ctx = RequestContext::from_parts(&parts, b"payload");
        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.path, "/v1/things");
        assert_eq!(ctx.query, Some("b=2&a=1"));
        assert_eq!(ctx.body, b"payload");
    }

    #[test]
    fn from_parts_without_query() {
        let request = http::Request::builder()
            .method("GET")
            .uri("/health")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let ctx = RequestContext::from_parts(&parts, b"");
        assert_eq!(ctx.query, None);
        assert_eq!(ctx.path, "/health");
    }
}
