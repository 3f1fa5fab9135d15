// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! # Protocol Core
//!
//! Version dispatch for the two wire protocols. Everything
//! version-dependent — header names, canonical signing input, signature
//! algorithm, auth-header format — is resolved here with an exhaustive
//! `match` on [`ProtocolVersion`], so no other module branches on the
//! version.
//!
//! ## Wire headers
//!
//! | Version | Auth header | Time header | Auth format |
//! |---------|-------------|-------------|-------------|
//! | V1 | `X-MWS-Authentication` | `X-MWS-Time` | `MWS {uuid}:{base64}` |
//! | V2 | `MCC-Authentication` | `MCC-Time` | `MWSV2 {uuid}:{base64};` |

pub mod canonical;
pub mod keys;
pub mod sign;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::HeaderValue;
use once_cell::sync::Lazy;
use regex::Regex;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;
use uuid::Uuid;

use crate::request::RequestContext;
use keys::KeyError;

/// The two wire protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Legacy protocol (`MWS` headers, hex-then-encrypt signature scheme).
    V1,
    /// Current protocol (`MWSV2` headers, standard RSASSA-PKCS1-v1_5).
    V2,
}

/// Errors raised by the protocol core.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A version tag on the wire did not name a known protocol version.
    #[error("unrecognized protocol version tag: {0}")]
    UnrecognizedVersion(String),

    /// Key material could not be loaded.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The RSA signing operation itself failed.
    #[error("RSA signing failed: {0}")]
    Signing(rsa::Error),

    /// A computed header value contained bytes HTTP cannot carry.
    #[error("header value could not be encoded: {0}")]
    HeaderEncoding(String),
}

// Auth header regexes. The UUID must be lowercase hyphenated RFC-4122 form
// (variant nibble 8/9/a/b) and the payload standard base64; V2 allows the
// trailing semicolon terminator.
static V1_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^MWS ([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[89ab][0-9a-f]{3}-[0-9a-f]{12}):([A-Za-z0-9+/]+={0,2})$",
    )
    .unwrap()
});
static V2_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^MWSV2 ([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[89ab][0-9a-f]{3}-[0-9a-f]{12}):([A-Za-z0-9+/]+={0,2});?$",
    )
    .unwrap()
});

impl ProtocolVersion {
    /// The version tag that prefixes the auth header value.
    pub const fn tag(self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "MWS",
            ProtocolVersion::V2 => "MWSV2",
        }
    }

    /// The authentication header name for this version.
    pub const fn auth_header(self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "X-MWS-Authentication",
            ProtocolVersion::V2 => "MCC-Authentication",
        }
    }

    /// The signed-time header name for this version.
    pub const fn time_header(self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "X-MWS-Time",
            ProtocolVersion::V2 => "MCC-Time",
        }
    }

    /// Resolve a wire tag to a version.
    pub fn from_tag(tag: &str) -> Result<Self, ProtocolError> {
        match tag {
            "MWS" => Ok(ProtocolVersion::V1),
            "MWSV2" => Ok(ProtocolVersion::V2),
            other => Err(ProtocolError::UnrecognizedVersion(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Compute the canonical signing input for a request under a version.
pub fn signing_input(
    version: ProtocolVersion,
    request: &RequestContext<'_>,
    app_uuid: &Uuid,
    signed_time: i64,
) -> Vec<u8> {
    match version {
        ProtocolVersion::V1 => canonical::signing_input_v1(
            request.method,
            request.path,
            request.body,
            app_uuid,
            signed_time,
        ),
        ProtocolVersion::V2 => canonical::signing_input_v2(
            request.method,
            request.path,
            request.query,
            request.body,
            app_uuid,
            signed_time,
        ),
    }
}

/// Compute the signature for a request: canonical input, then RSA sign.
pub fn signature(
    version: ProtocolVersion,
    request: &RequestContext<'_>,
    app_uuid: &Uuid,
    signed_time: i64,
    key: &RsaPrivateKey,
) -> Result<Vec<u8>, ProtocolError> {
    let input = signing_input(version, request, app_uuid, signed_time);
    sign::sign_payload(version, &input, key).map_err(ProtocolError::Signing)
}

/// Verify a claimed signature payload against a request.
pub fn verify(
    version: ProtocolVersion,
    request: &RequestContext<'_>,
    app_uuid: &Uuid,
    signed_time: i64,
    payload: &[u8],
    key: &RsaPublicKey,
) -> bool {
    let input = signing_input(version, request, app_uuid, signed_time);
    sign::verify_payload(version, &input, payload, key)
}

/// Build the two wire header values (auth, time) for a signed request.
///
/// The auth value is `{TAG} {uuid}:{base64}` — with a trailing `;` on V2
/// and none on V1, exactly as deployed receivers expect.
pub fn build_auth_headers(
    version: ProtocolVersion,
    request: &RequestContext<'_>,
    app_uuid: &Uuid,
    signed_time: i64,
    key: &RsaPrivateKey,
) -> Result<(HeaderValue, HeaderValue), ProtocolError> {
    let raw_signature = signature(version, request, app_uuid, signed_time, key)?;
    let encoded = BASE64.encode(&raw_signature);
    let auth_value = match version {
        ProtocolVersion::V1 => format!("{} {}:{}", version.tag(), app_uuid, encoded),
        ProtocolVersion::V2 => format!("{} {}:{};", version.tag(), app_uuid, encoded),
    };

    let auth = HeaderValue::from_str(&auth_value)
        .map_err(|e| ProtocolError::HeaderEncoding(e.to_string()))?;
    let time = HeaderValue::from_str(&signed_time.to_string())
        .map_err(|e| ProtocolError::HeaderEncoding(e.to_string()))?;
    Ok((auth, time))
}

/// Parse an auth header value into the claimed UUID and decoded payload.
///
/// Returns `None` when the value does not match the version's format.
pub fn parse_auth_header(version: ProtocolVersion, value: &str) -> Option<(Uuid, Vec<u8>)> {
    let re = match version {
        ProtocolVersion::V1 => &V1_HEADER_RE,
        ProtocolVersion::V2 => &V2_HEADER_RE,
    };
    let captures = re.captures(value)?;
    let app_uuid = Uuid::parse_str(&captures[1]).ok()?;
    let payload = BASE64.decode(&captures[2]).ok()?;
    Some((app_uuid, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn version_tags_round_trip() {
        assert_eq!(ProtocolVersion::from_tag("MWS").unwrap(), ProtocolVersion::V1);
        assert_eq!(ProtocolVersion::from_tag("MWSV2").unwrap(), ProtocolVersion::V2);
        assert!(matches!(
            ProtocolVersion::from_tag("MWSV3"),
            Err(ProtocolError::UnrecognizedVersion(_))
        ));
    }

    #[test]
    fn header_names_are_bit_exact() {
        assert_eq!(ProtocolVersion::V1.auth_header(), "X-MWS-Authentication");
        assert_eq!(ProtocolVersion::V1.time_header(), "X-MWS-Time");
        assert_eq!(ProtocolVersion::V2.auth_header(), "MCC-Authentication");
        assert_eq!(ProtocolVersion::V2.time_header(), "MCC-Time");
    }

    #[test]
    fn v2_auth_value_has_trailing_semicolon_and_v1_does_not() {
        let (private_key, _) = testutil::test_keypair();
        let request = RequestContext::new("GET", "/r", None, b"");
        let uuid = testutil::test_uuid();

        let (v2, _) =
            build_auth_headers(ProtocolVersion::V2, &request, &uuid, 1000000000, &private_key)
                .unwrap();
        let v2 = v2.to_str().unwrap();
        assert!(v2.starts_with(&format!("MWSV2 {uuid}:")));
        assert!(v2.ends_with(';'));

        let (v1, time) =
            build_auth_headers(ProtocolVersion::V1, &request, &uuid, 1000000000, &private_key)
                .unwrap();
        let v1 = v1.to_str().unwrap();
        assert!(v1.starts_with(&format!("MWS {uuid}:")));
        assert!(!v1.ends_with(';'));
        assert_eq!(time.to_str().unwrap(), "1000000000");
    }

    #[test]
    fn built_headers_parse_back() {
        let (private_key, _) = testutil::test_keypair();
        let request = RequestContext::new("GET", "/r", Some("a=1"), b"");
        let uuid = testutil::test_uuid();

        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            let (auth, _) =
                build_auth_headers(version, &request, &uuid, 1000000000, &private_key).unwrap();
            let (parsed_uuid, payload) =
                parse_auth_header(version, auth.to_str().unwrap()).unwrap();
            assert_eq!(parsed_uuid, uuid);
            assert!(!payload.is_empty());
        }
    }

    #[test]
    fn parse_rejects_malformed_values() {
        let good = "MWSV2 192cce84-8466-490e-b03e-074f82da3ee2:c2ln;";
        assert!(parse_auth_header(ProtocolVersion::V2, good).is_some());
        // Semicolon is optional on parse.
        assert!(parse_auth_header(
            ProtocolVersion::V2,
            "MWSV2 192cce84-8466-490e-b03e-074f82da3ee2:c2ln"
        )
        .is_some());

        // Wrong tag for the version.
        assert!(parse_auth_header(
            ProtocolVersion::V1,
            "MWSV2 192cce84-8466-490e-b03e-074f82da3ee2:c2ln;"
        )
        .is_none());
        // Uppercase UUID.
        assert!(parse_auth_header(
            ProtocolVersion::V2,
            "MWSV2 192CCE84-8466-490E-B03E-074F82DA3EE2:c2ln;"
        )
        .is_none());
        // Variant nibble outside [89ab].
        assert!(parse_auth_header(
            ProtocolVersion::V2,
            "MWSV2 192cce84-8466-490e-703e-074f82da3ee2:c2ln;"
        )
        .is_none());
        // Payload outside the base64 alphabet.
        assert!(parse_auth_header(
            ProtocolVersion::V2,
            "MWSV2 192cce84-8466-490e-b03e-074f82da3ee2:c2l!n;"
        )
        .is_none());
        // No payload at all.
        assert!(parse_auth_header(
            ProtocolVersion::V2,
            "MWSV2 192cce84-8466-490e-b03e-074f82da3ee2:"
        )
        .is_none());
    }
}
