// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! Outbound request signing.
//!
//! A [`SigningIdentity`] pairs an application UUID with its RSA private
//! key; [`RequestSigner`] stamps signature and time headers onto outgoing
//! requests. Both protocol versions are emitted by default so that
//! recipients of any vintage can verify; peers known to speak MWSV2 can
//! be addressed with [`SignVersions::V2Only`].

use std::sync::Arc;

use http::HeaderMap;
use rsa::RsaPrivateKey;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{self, env_required};
use crate::protocol::{self, keys, ProtocolError, ProtocolVersion};
use crate::request::RequestContext;

/// An application UUID together with its registered private key.
pub struct SigningIdentity {
    pub app_uuid: Uuid,
    private_key: RsaPrivateKey,
    signed_time_override: Option<i64>,
}

impl SigningIdentity {
    /// Build an identity from key material: either a PEM string or a path
    /// to a PEM file, in PKCS#1 or PKCS#8 form.
    pub fn new(app_uuid: Uuid, key_material: &str) -> Result<Self, keys::KeyError> {
        let private_key = keys::load_private_key(key_material)?;
        Ok(Self {
            app_uuid,
            private_key,
            signed_time_override: None,
        })
    }

    /// Read the identity from `MAUTH_APP_UUID` plus either
    /// `MAUTH_PRIVATE_KEY_PEM` or `MAUTH_PRIVATE_KEY_PATH`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let app_uuid: Uuid = env_required(config::APP_UUID_ENV)?
            .parse()
            .map_err(|e: uuid::Error| config::ConfigError::Invalid {
                name: config::APP_UUID_ENV.to_string(),
                message: e.to_string(),
            })?;
        let key_material = match std::env::var(config::PRIVATE_KEY_PEM_ENV) {
            Ok(pem) if !pem.trim().is_empty() => pem,
            _ => env_required(config::PRIVATE_KEY_PATH_ENV)?,
        };
        Self::new(app_uuid, &key_material).map_err(|e| config::ConfigError::Invalid {
            name: config::PRIVATE_KEY_PEM_ENV.to_string(),
            message: e.to_string(),
        })
    }

    /// Pin the signed timestamp instead of reading the clock. Meant for
    /// deterministic signing in tests and fixtures.
    pub fn with_signed_time(mut self, unix_secs: i64) -> Self {
        self.signed_time_override = Some(unix_secs);
        self
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub(crate) fn signed_time(&self, clock: &dyn Clock) -> i64 {
        self.signed_time_override
            .unwrap_or_else(|| clock.now().timestamp())
    }
}

/// Which protocol versions outgoing requests carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignVersions {
    /// Emit MWSV2 and MWS headers. Maximally compatible.
    #[default]
    Both,
    /// Emit only MWSV2 headers.
    V2Only,
}

/// Signs outgoing requests on behalf of one identity.
#[derive(Clone)]
pub struct RequestSigner {
    identity: Arc<SigningIdentity>,
    versions: SignVersions,
    clock: Arc<dyn Clock>,
}

impl RequestSigner {
    pub fn new(identity: Arc<SigningIdentity>) -> Self {
        Self {
            identity,
            versions: SignVersions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_versions(mut self, versions: SignVersions) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Compute signatures for `request` and insert the authentication and
    /// time headers into `headers`. One timestamp covers every emitted
    /// version.
    pub fn sign_request(
        &self,
        request: &RequestContext<'_>,
        headers: &mut HeaderMap,
    ) -> Result<(), ProtocolError> {
        let signed_time = self.identity.signed_time(self.clock.as_ref());

        let mut versions = vec![ProtocolVersion::V2];
        if self.versions == SignVersions::Both {
            versions.push(ProtocolVersion::V1);
        }

        for version in versions {
            let (auth, time) = protocol::build_auth_headers(
                version,
                request,
                &self.identity.app_uuid,
                signed_time,
                self.identity.private_key(),
            )?;
            headers.insert(version.auth_header(), auth);
            headers.insert(version.time_header(), time);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testutil;

    fn signer(versions: SignVersions) -> RequestSigner {
        let identity = Arc::new(
            SigningIdentity::new(testutil::test_uuid(), testutil::TEST_PRIVATE_KEY_PKCS1).unwrap(),
        );
        RequestSigner::new(identity)
            .with_versions(versions)
            .with_clock(Arc::new(FixedClock::at_unix(1_600_000_000)))
    }

    #[test]
    fn both_versions_emit_four_headers() {
        let request = RequestContext::new("GET", "/studies", None, b"");
        let mut headers = HeaderMap::new();
        signer(SignVersions::Both)
            .sign_request(&request, &mut headers)
            .unwrap();

        assert!(headers.contains_key("MCC-Authentication"));
        assert!(headers.contains_key("MCC-Time"));
        assert!(headers.contains_key("X-MWS-Authentication"));
        assert!(headers.contains_key("X-MWS-Time"));
        assert_eq!(headers.get("MCC-Time").unwrap(), "1600000000");
        assert_eq!(headers.get("X-MWS-Time").unwrap(), "1600000000");
    }

    #[test]
    fn v2_only_omits_legacy_headers() {
        let request = RequestContext::new("GET", "/studies", None, b"");
        let mut headers = HeaderMap::new();
        signer(SignVersions::V2Only)
            .sign_request(&request, &mut headers)
            .unwrap();

        assert!(headers.contains_key("MCC-Authentication"));
        assert!(!headers.contains_key("X-MWS-Authentication"));
        assert!(!headers.contains_key("X-MWS-Time"));
    }

    #[test]
    fn emitted_headers_verify_against_the_public_key() {
        let (_, public_key) = testutil::test_keypair();
        let request = RequestContext::new("POST", "/v1/items", Some("b=2&a=1"), b"{\"x\":1}");
        let mut headers = HeaderMap::new();
        signer(SignVersions::Both)
            .sign_request(&request, &mut headers)
            .unwrap();

        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            let header = headers
                .get(version.auth_header())
                .unwrap()
                .to_str()
                .unwrap();
            let (uuid, signature) = protocol::parse_auth_header(version, header).unwrap();
            assert_eq!(uuid, testutil::test_uuid());
            assert!(protocol::verify(
                version,
                &request,
                &uuid,
                1_600_000_000,
                &signature,
                &public_key
            ));
        }
    }

    #[test]
    fn v2_header_ends_with_semicolon() {
        let request = RequestContext::new("GET", "/", None, b"");
        let mut headers = HeaderMap::new();
        signer(SignVersions::V2Only)
            .sign_request(&request, &mut headers)
            .unwrap();

        let header = headers
            .get("MCC-Authentication")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(header.starts_with("MWSV2 "));
        assert!(header.ends_with(';'));
    }
}
