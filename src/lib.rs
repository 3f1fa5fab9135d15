// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! # mws-auth
//!
//! Mutual authentication for service-to-service HTTP. Every signed
//! request carries the sender's application UUID, a Unix timestamp, and
//! an RSA signature over a canonical rendering of the request; recipients
//! resolve the sender's public key from a central authority service and
//! verify the signature before trusting the request.
//!
//! Two wire versions are supported: the current `MWSV2` scheme
//! (`MCC-Authentication` / `MCC-Time`) and the legacy `MWS` scheme
//! (`X-MWS-Authentication` / `X-MWS-Time`). Outbound requests sign with
//! both by default; inbound verification prefers MWSV2 and falls back to
//! MWS when a request carries both.
//!
//! ## Signing
//!
//! ```no_run
//! use std::sync::Arc;
//! use mws_auth::{RequestContext, RequestSigner, SigningIdentity};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = Arc::new(SigningIdentity::from_env()?);
//! let signer = RequestSigner::new(identity);
//!
//! let request = RequestContext::new("GET", "/v1/studies", None, b"");
//! let mut headers = http::HeaderMap::new();
//! signer.sign_request(&request, &mut headers)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Verifying
//!
//! ```no_run
//! use mws_auth::{Authenticator, RequestContext};
//!
//! # async fn verify(headers: http::HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let authenticator = Authenticator::from_env()?;
//!
//! let request = RequestContext::new("POST", "/v1/items", None, b"{}");
//! if authenticator.is_authentic(&headers, &request).await? {
//!     // handle the request
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MAUTH_URL` | required | Base URL of the authority service |
//! | `MAUTH_APP_UUID` | required for signing | This application's UUID |
//! | `MAUTH_PRIVATE_KEY_PEM` | — | RSA private key, PEM text |
//! | `MAUTH_PRIVATE_KEY_PATH` | — | Path to the key when the PEM is not inlined |
//! | `MAUTH_REQUEST_TIMEOUT_SECS` | `3` | Per-request authority timeout |
//! | `MAUTH_RETRY_POLICY` | `retry_once` | `no_retry`, `retry_once`, `retry_twice`, `aggressive` |
//! | `MAUTH_DISABLE_V1` | `false` | Refuse legacy MWS submissions |
//! | `MAUTH_KEY_TTL_SECS` | `3600` | Key cache TTL when the authority sends no max-age |

pub mod authenticator;
pub mod authority;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod request;
pub mod signer;

#[cfg(test)]
pub(crate) mod testutil;

pub use authenticator::Authenticator;
pub use authority::cache::KeyCache;
pub use authority::{
    ApplicationInfo, AuthorityClient, AuthorityError, AuthorityTransport, HttpTransport,
    TokenRequest, TokenResponse, TransportError,
};
pub use clock::{Clock, SystemClock};
pub use config::{AuthenticatorConfig, AuthorityConfig, ConfigError, RetryPolicy};
pub use error::AuthenticationError;
pub use protocol::ProtocolVersion;
pub use request::RequestContext;
pub use signer::{RequestSigner, SignVersions, SigningIdentity};
