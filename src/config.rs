// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! # Runtime Configuration
//!
//! Builder-style configuration for the authority client and the
//! authenticator, with `from_env` constructors for the common deployment
//! path. Configuration is validated at construction time: a retry budget
//! that would allow zero attempts is a configuration error here, never a
//! call-time surprise.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MAUTH_URL` | Base URL of the authority service | Required |
//! | `MAUTH_APP_UUID` | This application's UUID | Required for signing |
//! | `MAUTH_PRIVATE_KEY_PEM` | Inline PEM private key | One of PEM/PATH required for signing |
//! | `MAUTH_PRIVATE_KEY_PATH` | Path to a PEM private key file | — |
//! | `MAUTH_REQUEST_TIMEOUT_SECS` | Per-request authority timeout | `3` |
//! | `MAUTH_RETRY_POLICY` | `no_retry`, `retry_once`, `retry_twice`, `aggressive` | `retry_once` |
//! | `MAUTH_DISABLE_V1` | Refuse V1 submissions and V1 fallback (`true`/`false`) | `false` |
//! | `MAUTH_KEY_TTL_SECS` | Cache TTL when the authority sends no max-age | `3600` |

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Environment variable naming the authority service base URL.
pub const AUTHORITY_URL_ENV: &str = "MAUTH_URL";
/// Environment variable naming this application's UUID.
pub const APP_UUID_ENV: &str = "MAUTH_APP_UUID";
/// Environment variable carrying an inline PEM private key.
pub const PRIVATE_KEY_PEM_ENV: &str = "MAUTH_PRIVATE_KEY_PEM";
/// Environment variable carrying a path to a PEM private key file.
pub const PRIVATE_KEY_PATH_ENV: &str = "MAUTH_PRIVATE_KEY_PATH";
/// Environment variable for the per-request authority timeout in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "MAUTH_REQUEST_TIMEOUT_SECS";
/// Environment variable selecting the authority retry policy.
pub const RETRY_POLICY_ENV: &str = "MAUTH_RETRY_POLICY";
/// Environment variable disabling V1 submissions and fallback.
pub const DISABLE_V1_ENV: &str = "MAUTH_DISABLE_V1";
/// Environment variable for the default key cache TTL in seconds.
pub const KEY_TTL_ENV: &str = "MAUTH_KEY_TTL_SECS";

/// Default per-request timeout for authority calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Default cache TTL when the authority response carries no
/// `Cache-Control: max-age`.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

/// Configuration errors. Raised at construction, never at call time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("required environment variable {0} is not set")]
    MissingEnv(String),

    /// A configuration value could not be parsed or is out of range.
    #[error("invalid value for {name}: {message}")]
    Invalid { name: String, message: String },

    /// The retry budget would allow zero fetch attempts.
    #[error("retry budget must allow at least one attempt")]
    ZeroAttempts,
}

/// How many additional attempts the authority client makes after a failed
/// fetch. Total attempts = additional + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// One attempt, no retries.
    NoRetry,
    /// One retry (two attempts total).
    #[default]
    RetryOnce,
    /// Two retries (three attempts total).
    RetryTwice,
    /// Nine retries; for callers that prefer availability over latency.
    Aggressive,
}

impl RetryPolicy {
    /// Additional attempts after the first.
    pub fn additional_attempts(self) -> u32 {
        match self {
            RetryPolicy::NoRetry => 0,
            RetryPolicy::RetryOnce => 1,
            RetryPolicy::RetryTwice => 2,
            RetryPolicy::Aggressive => 9,
        }
    }

    /// Total attempts, always at least one.
    pub fn total_attempts(self) -> u32 {
        self.additional_attempts() + 1
    }
}

impl std::str::FromStr for RetryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_retry" => Ok(RetryPolicy::NoRetry),
            "retry_once" => Ok(RetryPolicy::RetryOnce),
            "retry_twice" => Ok(RetryPolicy::RetryTwice),
            "aggressive" => Ok(RetryPolicy::Aggressive),
            other => Err(ConfigError::Invalid {
                name: RETRY_POLICY_ENV.to_string(),
                message: format!("unknown retry policy '{other}'"),
            }),
        }
    }
}

/// Configuration for the authority service client.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Base URL of the authority service.
    pub base_url: Url,
    /// Per-request timeout; an exceeded timeout counts as a failed attempt.
    pub request_timeout: Duration,
    max_attempts: u32,
}

impl AuthorityConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: RetryPolicy::default().total_attempts(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.max_attempts = policy.total_attempts();
        self
    }

    /// Override the attempt budget directly. Fails fast on zero.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// Total fetch attempts per resolution. Guaranteed >= 1.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Read the authority configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url: Url = env_required(AUTHORITY_URL_ENV)?
            .parse()
            .map_err(|e: url::ParseError| ConfigError::Invalid {
                name: AUTHORITY_URL_ENV.to_string(),
                message: e.to_string(),
            })?;

        let mut config = Self::new(base_url);

        if let Ok(secs) = std::env::var(REQUEST_TIMEOUT_ENV) {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::Invalid {
                name: REQUEST_TIMEOUT_ENV.to_string(),
                message: format!("'{secs}' is not a number of seconds"),
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        if let Ok(policy) = std::env::var(RETRY_POLICY_ENV) {
            config = config.with_retry_policy(policy.parse()?);
        }

        Ok(config)
    }
}

/// Configuration for the inbound [`crate::Authenticator`].
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    pub authority: AuthorityConfig,
    /// Refuse V1 submissions outright and never fall back to V1.
    pub disable_v1: bool,
    /// Cache TTL when the authority response carries no max-age.
    pub default_key_ttl: Duration,
}

impl AuthenticatorConfig {
    pub fn new(authority: AuthorityConfig) -> Self {
        Self {
            authority,
            disable_v1: false,
            default_key_ttl: DEFAULT_KEY_TTL,
        }
    }

    pub fn with_v1_disabled(mut self, disabled: bool) -> Self {
        self.disable_v1 = disabled;
        self
    }

    pub fn with_default_key_ttl(mut self, ttl: Duration) -> Self {
        self.default_key_ttl = ttl;
        self
    }

    /// Read the authenticator configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(AuthorityConfig::from_env()?);

        if let Ok(flag) = std::env::var(DISABLE_V1_ENV) {
            config.disable_v1 = matches!(flag.trim(), "true" | "1" | "yes");
        }

        if let Ok(secs) = std::env::var(KEY_TTL_ENV) {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::Invalid {
                name: KEY_TTL_ENV.to_string(),
                message: format!("'{secs}' is not a number of seconds"),
            })?;
            config.default_key_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Read a required environment variable.
pub(crate) fn env_required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}
