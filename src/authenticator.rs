// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! Inbound request authentication.
//!
//! The [`Authenticator`] extracts signature headers from an incoming
//! request, resolves the claimed application's public key through the
//! [`KeyCache`], and verifies the signature. MWSV2 headers are preferred;
//! when a request carries both versions and the MWSV2 signature does not
//! verify, the legacy MWS signature is tried before rejecting (unless V1
//! is disabled by policy).

use std::sync::Arc;

use http::HeaderMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::authority::cache::KeyCache;
use crate::authority::{AuthorityClient, AuthorityError, HttpTransport};
use crate::config::{AuthenticatorConfig, ConfigError};
use crate::error::AuthenticationError;
use crate::protocol::{self, keys, ProtocolVersion};
use crate::request::RequestContext;

/// Verifies inbound request signatures against authority-registered keys.
#[derive(Clone)]
pub struct Authenticator {
    cache: KeyCache,
    disable_v1: bool,
}

impl Authenticator {
    pub fn new(cache: KeyCache) -> Self {
        Self {
            cache,
            disable_v1: false,
        }
    }

    /// Refuse V1 submissions outright, including the V2-to-V1 fallback.
    pub fn with_v1_disabled(mut self, disabled: bool) -> Self {
        self.disable_v1 = disabled;
        self
    }

    /// Build an authenticator with an HTTP transport from configuration.
    pub fn from_config(config: &AuthenticatorConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config.authority.request_timeout).map_err(|e| {
            ConfigError::Invalid {
                name: "http client".to_string(),
                message: e.to_string(),
            }
        })?;
        let client = AuthorityClient::new(&config.authority, Arc::new(transport));
        let cache = KeyCache::new(client, config.default_key_ttl);
        Ok(Self::new(cache).with_v1_disabled(config.disable_v1))
    }

    /// Build an authenticator from `MAUTH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_config(&AuthenticatorConfig::from_env()?)
    }

    /// Authenticate an inbound request, returning the UUID of the signing
    /// application on success.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        request: &RequestContext<'_>,
    ) -> Result<Uuid, AuthenticationError> {
        let has_v2 = headers.contains_key(ProtocolVersion::V2.auth_header());
        let has_v1 = headers.contains_key(ProtocolVersion::V1.auth_header());

        let version = if has_v2 {
            ProtocolVersion::V2
        } else if has_v1 {
            ProtocolVersion::V1
        } else {
            return Err(AuthenticationError::MissingHeader);
        };

        match self.verify_version(version, headers, request).await {
            // A failed V2 signature may still be an honest V1-era client
            // that also sent legacy headers; give those one more chance.
            Err(AuthenticationError::VerificationFailed(app_uuid))
                if version == ProtocolVersion::V2 && has_v1 && !self.disable_v1 =>
            {
                debug!(app_uuid = %app_uuid, "MWSV2 verification failed, trying MWS fallback");
                self.verify_version(ProtocolVersion::V1, headers, request)
                    .await
            }
            outcome => outcome,
        }
    }

    /// Boolean form of [`authenticate`](Self::authenticate): rejections
    /// become `Ok(false)`, infrastructure failures stay errors.
    pub async fn is_authentic(
        &self,
        headers: &HeaderMap,
        request: &RequestContext<'_>,
    ) -> Result<bool, AuthenticationError> {
        match self.authenticate(headers, request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_rejection() => {
                warn!(error = %e, "request rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn verify_version(
        &self,
        version: ProtocolVersion,
        headers: &HeaderMap,
        request: &RequestContext<'_>,
    ) -> Result<Uuid, AuthenticationError> {
        if version == ProtocolVersion::V1 && self.disable_v1 {
            return Err(AuthenticationError::VersionDisabled(version));
        }

        let auth_header = headers
            .get(version.auth_header())
            .ok_or(AuthenticationError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthenticationError::InvalidHeaderFormat)?;
        let (app_uuid, signature) = protocol::parse_auth_header(version, auth_header)
            .ok_or(AuthenticationError::InvalidHeaderFormat)?;

        let signed_time: i64 = headers
            .get(version.time_header())
            .ok_or(AuthenticationError::InvalidTimeHeader)?
            .to_str()
            .map_err(|_| AuthenticationError::InvalidTimeHeader)?
            .trim()
            .parse()
            .map_err(|_| AuthenticationError::InvalidTimeHeader)?;
        if signed_time <= 0 {
            return Err(AuthenticationError::InvalidTimeHeader);
        }

        let info = match self.cache.resolve(app_uuid).await {
            Ok(info) => info,
            Err(AuthorityError::Unreachable(failure)) => {
                // A stale entry must not outlive a flapping authority.
                self.cache.evict(&app_uuid).await;
                return Err(AuthenticationError::AuthorityUnreachable(failure));
            }
            Err(e) => return Err(AuthenticationError::Unexpected(e.to_string())),
        };

        let public_key = match keys::load_public_key(&info.public_key_str) {
            Ok(key) => key,
            Err(e) => {
                warn!(app_uuid = %app_uuid, error = %e, "registered public key is unusable");
                return Err(AuthenticationError::VerificationFailed(app_uuid));
            }
        };

        if protocol::verify(version, request, &app_uuid, signed_time, &signature, &public_key) {
            debug!(app_uuid = %app_uuid, version = %version, "request authenticated");
            Ok(app_uuid)
        } else {
            Err(AuthenticationError::VerificationFailed(app_uuid))
        }
    }
}
