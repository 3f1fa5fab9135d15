// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 mws-auth contributors

//! Retried execution of authority fetches.
//!
//! Requests are not reusable across attempts (each carries a fresh signed
//! timestamp), so the caller supplies a factory that builds and executes
//! one attempt. Non-success responses and transport errors both consume
//! an attempt; every failure is recorded so the terminal error carries the
//! whole story, first attempt first.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};

use super::{TokenResponse, TransportError};

/// Longest failure-body excerpt kept per attempt.
const DETAIL_LIMIT: usize = 256;

/// One failed attempt: the response status (if a response arrived at all)
/// and a short diagnostic excerpt.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    /// HTTP status of the failure response; `None` for transport errors.
    pub status: Option<u16>,
    /// Response-body excerpt or transport error message.
    pub detail: String,
}

/// Terminal failure after the attempt budget is exhausted. Carries every
/// collected failure in order; the first entry holds the original status.
#[derive(Debug, Clone, Error)]
#[error("{request} failed after {} attempt(s): {}", .attempts.len(), .attempts.first().map(|a| a.detail.as_str()).unwrap_or("no attempts made"))]
pub struct RetryFailure {
    /// Description of the request being retried.
    pub request: String,
    /// One entry per attempt, in attempt order.
    pub attempts: Vec<AttemptFailure>,
}

/// Execute `attempt` until it yields a success status or the budget runs
/// out. `max_attempts` is validated to be >= 1 by
/// [`crate::config::AuthorityConfig`]; the factory is invoked once per
/// attempt so every try sends a freshly built request.
pub async fn fetch_with_retry<F, Fut>(
    request_label: &str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<TokenResponse, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TokenResponse, TransportError>>,
{
    let mut failures: Vec<AttemptFailure> = Vec::new();

    for n in 1..=max_attempts {
        match attempt().await {
            Ok(response) if (200..300).contains(&response.status) => {
                if n > 1 {
                    debug!(request = %request_label, attempt = n, "fetch succeeded after retry");
                }
                return Ok(response);
            }
            Ok(response) => {
                warn!(
                    request = %request_label,
                    attempt = n,
                    status = response.status,
                    "authority fetch returned non-success status"
                );
                failures.push(AttemptFailure {
                    status: Some(response.status),
                    detail: body_excerpt(&response.body),
                });
            }
            Err(e) => {
                warn!(request = %request_label, attempt = n, error = %e, "authority fetch failed");
                failures.push(AttemptFailure {
                    status: None,
                    detail: e.to_string(),
                });
            }
        }
    }

    Err(RetryFailure {
        request: request_label.to_string(),
        attempts: failures,
    })
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(DETAIL_LIMIT) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}
