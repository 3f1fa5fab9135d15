// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! Authentication failure taxonomy.
//!
//! Failures split into two classes. *Rejections* mean the request did not
//! prove its identity — a malformed or missing header, a disabled version,
//! a signature that does not verify. *Infrastructure failures* mean this
//! service could not complete the check at all (the authority was
//! unreachable, or something unexpected broke). The boolean entry point
//! [`crate::Authenticator::is_authentic`] maps rejections to `Ok(false)`
//! and surfaces infrastructure failures as errors.

use thiserror::Error;
use uuid::Uuid;

use crate::authority::retry::RetryFailure;
use crate::protocol::ProtocolVersion;

/// Why an incoming request failed to authenticate.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// Neither version's authentication header was present.
    #[error("no authentication header present on the request")]
    MissingHeader,

    /// The authentication header did not match the version's format.
    #[error("authentication header does not match the expected format")]
    InvalidHeaderFormat,

    /// The signed-time header was absent, zero, or not a positive integer.
    #[error("signed-time header is missing, zero, or not a positive integer")]
    InvalidTimeHeader,

    /// The request used a protocol version disabled by policy.
    #[error("protocol version {0} is disabled by policy")]
    VersionDisabled(ProtocolVersion),

    /// The authority service could not be reached within the retry budget.
    #[error("authority service unreachable: {0}")]
    AuthorityUnreachable(#[source] RetryFailure),

    /// The signature did not verify for the claimed application.
    #[error("signature verification failed for application {0}")]
    VerificationFailed(Uuid),

    /// Anything else; never silently swallowed.
    #[error("unexpected authentication failure: {0}")]
    Unexpected(String),
}

impl AuthenticationError {
    /// Whether this failure is a rejection of the request (as opposed to an
    /// infrastructure failure of the check itself).
    pub fn is_rejection(&self) -> bool {
        match self {
            AuthenticationError::MissingHeader
            | AuthenticationError::InvalidHeaderFormat
            | AuthenticationError::InvalidTimeHeader
            | AuthenticationError::VersionDisabled(_)
            | AuthenticationError::VerificationFailed(_) => true,
            AuthenticationError::AuthorityUnreachable(_) | AuthenticationError::Unexpected(_) => {
                false
            }
        }
    }
}
