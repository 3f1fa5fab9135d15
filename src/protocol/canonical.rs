// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! Canonical signing input construction.
//!
//! Both protocol versions sign a deterministic byte string derived from the
//! request. The two algorithms differ on purpose and must stay byte-exact:
//!
//! - **V1** (legacy, frozen): `{METHOD}\n{PATH}\n{BODY}\n{uuid}\n{secs}`,
//!   SHA-512 hashed, then **hex-encoded** — the hex string, not the raw
//!   digest, is what gets signed. Deployed clients depend on this.
//! - **V2**: the URL path is normalized, the body is digested separately
//!   (so large bodies never have to sit inside the outer string), and the
//!   query string is decoded, re-encoded and sorted. The signing input is
//!   the raw SHA-512 digest of
//!   `{METHOD}\n{PATH}\n{BODY_DIGEST_HEX}\n{uuid}\n{secs}\n{QUERY}`.

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// Characters left literal by the V2 query re-encoding: alphanumerics and
/// the unreserved marks `-`, `_`, `.`, `~`. Everything else becomes `%XX`.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the V1 signing input for a request.
///
/// An absent body must be passed as an empty slice; the protocol has no
/// notion of "no body", only a zero-length one.
pub fn signing_input_v1(
    method: &str,
    path: &str,
    body: &[u8],
    app_uuid: &Uuid,
    signed_time: i64,
) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(path.as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    hasher.update(b"\n");
    hasher.update(app_uuid.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(signed_time.to_string().as_bytes());
    hex::encode(hasher.finalize()).into_bytes()
}

/// Build the V2 signing input for a request.
///
/// Returns the raw SHA-512 digest of the canonical string; the signer binds
/// it with the SHA-512 `DigestInfo` prefix.
pub fn signing_input_v2(
    method: &str,
    path: &str,
    query: Option<&str>,
    body: &[u8],
    app_uuid: &Uuid,
    signed_time: i64,
) -> Vec<u8> {
    let body_digest = hex::encode(Sha512::digest(body));
    let encoded_query = query.map_or_else(String::new, encode_query);
    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        normalize_path(path),
        body_digest,
        app_uuid,
        signed_time,
        encoded_query
    );
    Sha512::digest(canonical.as_bytes()).to_vec()
}

/// Normalize a URL path for V2 canonicalization.
///
/// Collapses repeated slashes, resolves `.` and `..` segments (clamping at
/// the root rather than erroring), preserves a trailing slash, and
/// uppercases percent-encoded hex digits.
pub fn normalize_path(path: &str) -> String {
    let trailing_slash =
        path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..") || path.is_empty();

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Clamp at root: "/a/b/../../.." resolves to "/".
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if trailing_slash && normalized != "/" {
        normalized.push('/');
    }
    uppercase_percent_encodings(&normalized)
}

/// Re-encode a raw query string per the V2 scheme.
///
/// Each parameter is split on `=`, each part percent-decoded (`+` is taken
/// as an encoded space first, so pre-encoded input normalizes), and the
/// parameter list is sorted by the decoded key bytes, tie-broken by the
/// decoded value bytes. Parts are then re-encoded with [`QUERY_ENCODE_SET`]
/// and rejoined.
pub fn encode_query(query: &str) -> String {
    let mut params: Vec<Vec<Vec<u8>>> = query
        .split('&')
        .map(|param| {
            param
                .split('=')
                .map(|part| percent_decode_str(&part.replace('+', " ")).collect())
                .collect()
        })
        .collect();

    params.sort();
    params
        .iter()
        .map(|param| {
            param
                .iter()
                .map(|part| percent_encode(part, QUERY_ENCODE_SET).to_string())
                .collect::<Vec<String>>()
                .join("=")
        })
        .collect::<Vec<String>>()
        .join("&")
}

/// Uppercase the two hex digits of every percent escape in `input`.
fn uppercase_percent_encodings(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push('%');
            out.push(bytes[i + 1].to_ascii_uppercase() as char);
            out.push(bytes[i + 2].to_ascii_uppercase() as char);
            i += 3;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_UUID: &str = "192cce84-8466-490e-b03e-074f82da3ee2";

    fn app_uuid() -> Uuid {
        APP_UUID.parse().unwrap()
    }

    #[test]
    fn normalize_collapses_slashes_and_keeps_trailing_slash() {
        assert_eq!(normalize_path("//a///b/"), "/a/b/");
        assert_eq!(normalize_path("/a/b"), "/a/b");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_path("//a///b/");
        assert_eq!(normalize_path(&once), once);
    }

    #[test]
    fn normalize_resolves_dot_segments() {
        assert_eq!(normalize_path("/a/./b"), "/a/b");
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("/a/b/.."), "/a/");
    }

    #[test]
    fn normalize_clamps_parent_traversal_at_root() {
        assert_eq!(normalize_path("/a/b/../../.."), "/");
        assert_eq!(normalize_path("/.."), "/");
    }

    #[test]
    fn normalize_uppercases_percent_hex() {
        assert_eq!(normalize_path("/a%2fb/c%aa"), "/a%2Fb/c%AA");
    }

    #[test]
    fn encode_query_sorts_by_key_then_value() {
        assert_eq!(encode_query("b=2&a=1"), "a=1&b=2");
        assert_eq!(encode_query("a=2&a=1"), "a=1&a=2");
    }

    #[test]
    fn encode_query_normalizes_pre_encoded_input() {
        // %7E decodes to '~', which stays literal on re-encoding.
        assert_eq!(encode_query("k=%7Ev"), "k=~v");
        // '+' is an encoded space; a decoded space re-encodes to %20.
        assert_eq!(encode_query("k=a+b"), "k=a%20b");
        // A decoded '%' re-encodes to %25.
        assert_eq!(encode_query("k=100%25"), "k=100%25");
    }

    #[test]
    fn encode_query_escapes_reserved_bytes() {
        assert_eq!(encode_query("k=a/b"), "k=a%2Fb");
        assert_eq!(encode_query("r_k-1.2~=x"), "r_k-1.2~=x");
    }

    #[test]
    fn v2_input_is_query_order_invariant() {
        let a = signing_input_v2("GET", "/resource", Some("b=2&a=1"), b"", &app_uuid(), 1000000000);
        let b = signing_input_v2("GET", "/resource", Some("a=1&b=2"), b"", &app_uuid(), 1000000000);
        assert_eq!(a, b);
    }

    #[test]
    fn v2_input_changes_with_time() {
        let a = signing_input_v2("GET", "/resource", None, b"", &app_uuid(), 1000000000);
        let b = signing_input_v2("GET", "/resource", None, b"", &app_uuid(), 1000000001);
        assert_ne!(a, b);
    }

    #[test]
    fn v1_input_is_hex_of_sha512() {
        let input = signing_input_v1("GET", "/studies", b"", &app_uuid(), 1000000000);
        // 128 hex characters of SHA-512 output.
        assert_eq!(input.len(), 128);
        assert!(input.iter().all(u8::is_ascii_hexdigit));
    }

    #[test]
    fn v1_input_matches_manual_concatenation() {
        let expected = {
            let canonical = format!("GET\n/studies\nbody\n{APP_UUID}\n1000000000");
            hex::encode(Sha512::digest(canonical.as_bytes())).into_bytes()
        };
        assert_eq!(
            signing_input_v1("GET", "/studies", b"body", &app_uuid(), 1000000000),
            expected
        );
    }

    #[test]
    fn absent_query_leaves_final_segment_empty() {
        let with_empty = {
            let canonical = format!(
                "GET\n/r\n{}\n{APP_UUID}\n7\n",
                hex::encode(Sha512::digest(b""))
            );
            Sha512::digest(canonical.as_bytes()).to_vec()
        };
        assert_eq!(
            signing_input_v2("GET", "/r", None, b"", &app_uuid(), 7),
            with_empty
        );
    }
}
