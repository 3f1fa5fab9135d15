// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! # Authority client
//!
//! Resolves application public keys from the central authority via
//! `GET {base}/mauth/v1/security_tokens/{uuid}.json`. Fetches are retried
//! per the configured budget ([`retry`]) and cached with request collapsing
//! ([`cache`]). When a signing identity is configured, outgoing fetches are
//! themselves signed so the authority can require mutual authentication.
//!
//! Transport is abstracted behind [`AuthorityTransport`] so tests can swap
//! the HTTP layer for a scripted fake.

pub mod cache;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthorityConfig;
use crate::protocol::{self, ProtocolVersion};
use crate::request::RequestContext;
use crate::signer::SigningIdentity;
use retry::{fetch_with_retry, RetryFailure};

/// Registration record for one application, as served by the authority.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationInfo {
    pub app_name: String,
    pub app_uuid: Uuid,
    /// PEM-encoded RSA public key, exactly as registered.
    pub public_key_str: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SecurityTokenEnvelope {
    security_token: ApplicationInfo,
}

/// A fully built token fetch, ready for one transport attempt.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

/// Transport-level view of an authority response. Only the pieces the
/// client consumes are surfaced.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub status: u16,
    pub cache_control: Option<String>,
    pub body: Vec<u8>,
}

/// Failure to obtain any response at all (connect, TLS, timeout).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Executes a single token fetch. Implemented by [`HttpTransport`] in
/// production and by scripted fakes in tests.
#[async_trait]
pub trait AuthorityTransport: Send + Sync {
    async fn execute(&self, request: TokenRequest) -> Result<TokenResponse, TransportError>;
}

/// reqwest-backed transport with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AuthorityError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AuthorityTransport for HttpTransport {
    async fn execute(&self, request: TokenRequest) -> Result<TokenResponse, TransportError> {
        let response = self
            .client
            .get(request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let cache_control = response
            .headers()
            .get(http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?
            .to_vec();

        Ok(TokenResponse {
            status,
            cache_control,
            body,
        })
    }
}

/// Errors from the authority client and the cache in front of it.
#[derive(Debug, Clone, Error)]
pub enum AuthorityError {
    /// The authority could not be reached or kept failing within the
    /// retry budget.
    #[error("authority unreachable: {0}")]
    Unreachable(#[from] RetryFailure),
    /// The authority answered but the payload was not a usable record.
    #[error("invalid authority response: {0}")]
    InvalidResponse(String),
    /// The fetch could not even be built (bad URL, signing failure).
    #[error("invalid authority request: {0}")]
    InvalidRequest(String),
}

static MAX_AGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)max-age\s*=\s*(\d+)").unwrap());

/// Extract a TTL from a `Cache-Control` header value, if one is present.
fn parse_max_age(cache_control: Option<&str>) -> Option<Duration> {
    let value = cache_control?;
    let captures = MAX_AGE_RE.captures(value)?;
    let secs: u64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs(secs))
}

/// Fetches application records from the authority, signing the fetch when
/// an identity is configured and retrying per the configured budget.
#[derive(Clone)]
pub struct AuthorityClient {
    transport: Arc<dyn AuthorityTransport>,
    base_url: Url,
    max_attempts: u32,
    signing: Option<Arc<SigningIdentity>>,
    clock: Arc<dyn Clock>,
}

impl AuthorityClient {
    pub fn new(config: &AuthorityConfig, transport: Arc<dyn AuthorityTransport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            max_attempts: config.max_attempts(),
            signing: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sign token fetches as `identity` using MWSV2, for authorities that
    /// require mutual authentication on the key endpoint itself.
    pub fn with_signing_identity(mut self, identity: Arc<SigningIdentity>) -> Self {
        self.signing = Some(identity);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn token_url(&self, app_uuid: &Uuid) -> Result<Url, AuthorityError> {
        self.base_url
            .join(&format!("mauth/v1/security_tokens/{app_uuid}.json"))
            .map_err(|e| AuthorityError::InvalidRequest(e.to_string()))
    }

    fn build_request(&self, app_uuid: &Uuid) -> Result<TokenRequest, AuthorityError> {
        let url = self.token_url(app_uuid)?;
        let mut headers = HeaderMap::new();

        if let Some(identity) = &self.signing {
            // Fresh timestamp per attempt keeps retried fetches verifiable.
            let signed_time = identity.signed_time(self.clock.as_ref());
            let context = RequestContext::new("GET", url.path(), url.query(), b"");
            let (auth, time) = protocol::build_auth_headers(
                ProtocolVersion::V2,
                &context,
                &identity.app_uuid,
                signed_time,
                identity.private_key(),
            )
            .map_err(|e| AuthorityError::InvalidRequest(e.to_string()))?;
            headers.insert(ProtocolVersion::V2.auth_header(), auth);
            headers.insert(ProtocolVersion::V2.time_header(), time);
        }

        Ok(TokenRequest { url, headers })
    }

    /// Fetch the registration record for `app_uuid`, together with the TTL
    /// the authority advertised (if any).
    pub async fn fetch_application_info(
        &self,
        app_uuid: &Uuid,
    ) -> Result<(ApplicationInfo, Option<Duration>), AuthorityError> {
        let label = format!("GET security_tokens/{app_uuid}");
        let response = fetch_with_retry(&label, self.max_attempts, || {
            let request = self.build_request(app_uuid);
            let transport = Arc::clone(&self.transport);
            async move {
                match request {
                    Ok(request) => transport.execute(request).await,
                    Err(e) => Err(TransportError(e.to_string())),
                }
            }
        })
        .await?;

        let envelope: SecurityTokenEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| AuthorityError::InvalidResponse(e.to_string()))?;
        let ttl = parse_max_age(response.cache_control.as_deref());

        debug!(
            app_uuid = %app_uuid,
            app_name = %envelope.security_token.app_name,
            ttl_secs = ttl.map(|t| t.as_secs()),
            "fetched application record"
        );
        Ok((envelope.security_token, ttl))
    }
}
