//! Bounded-attempt retry with class-specific profiles (§4.2).
//!
//! Three named profiles — [`RetryProfile::Normal`], [`RetryProfile::Long`],
//! [`RetryProfile::VeryLong`] — each a `(max_attempts, inter_attempt_wait)`
//! pair. Attempt 1 is always made; attempts `2..=max_attempts` follow an
//! `inter_attempt_wait` sleep. Success on any attempt terminates. A
//! `CancellationToken` accompanies every call: if observed, pending waits are
//! abandoned and a [`Error::cancelled`](crate::error::Error::cancelled) is
//! returned instead.

use crate::error::Error;
use reqwest::header::HeaderMap;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod classifier;

/// Named retry profile. Exact durations are an implementation choice (not
/// specified numerically by the reconciliation contract) — see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryProfile {
    /// Configuration propagation / dependency-visibility delays.
    Normal,
    /// Request-attribute propagation delays.
    Long,
    /// Application/synthetic readiness delays.
    VeryLong,
}

/// Resolved `(max_attempts, inter_attempt_wait, wait_ceiling)` for a profile.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub wait: Duration,
    /// Ceiling a `Retry-After` floor is capped at (§4.2 ambient note).
    pub wait_ceiling: Duration,
}

impl RetryProfile {
    #[must_use]
    pub const fn config(self) -> RetryConfig {
        match self {
            Self::Normal => RetryConfig {
                max_attempts: 5,
                wait: Duration::from_secs(5),
                wait_ceiling: Duration::from_secs(10),
            },
            Self::Long => RetryConfig {
                max_attempts: 5,
                wait: Duration::from_secs(15),
                wait_ceiling: Duration::from_secs(30),
            },
            Self::VeryLong => RetryConfig {
                max_attempts: 10,
                wait: Duration::from_secs(30),
                wait_ceiling: Duration::from_secs(120),
            },
        }
    }
}

/// A single retry attempt, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct RetryInfo {
    pub attempt: u32,
    pub status_code: Option<u16>,
    pub wait: Duration,
    pub reason: String,
}

/// Parses the `Retry-After` header: either a delay in seconds or an HTTP-date.
/// Returns `None` if absent, malformed, or in the past.
#[must_use]
pub fn parse_retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?;
    parse_retry_after_value(value)
}

#[must_use]
pub fn parse_retry_after_value(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(SystemTime::now()).ok()
}

/// Combines the profile's fixed wait with an optional server-specified
/// `Retry-After` floor, capped at the profile's ceiling.
#[must_use]
pub fn resolve_wait(config: &RetryConfig, retry_after: Option<Duration>) -> Duration {
    retry_after.map_or(config.wait, |server_wait| {
        config.wait.max(server_wait).min(config.wait_ceiling)
    })
}

/// `true` if `err` is the rate limiter's own signal (HTTP-429) rather than a
/// retry-class failure. The rate limiter owns 429 unconditionally: it is
/// always retried and never counted against a profile's attempt budget, nor
/// consulted via `should_retry` (§4.2, §7).
fn is_rate_limited(err: &Error) -> bool {
    err.status() == Some(429)
}

/// Runs `operation` under the profile's attempt budget.
///
/// `should_retry` is consulted on every non-429 error; a `false` verdict
/// surfaces the error immediately regardless of attempts remaining. A 429
/// response bypasses `should_retry` entirely and is always retried, honoring
/// any `Retry-After` the response carried, without consuming the attempt
/// budget — the rate limiter, not the retry engine, owns that wait.
///
/// # Errors
/// Returns the last error once attempts are exhausted, the first
/// non-retryable error, or [`Error::cancelled`] if the token fires.
pub async fn execute_with_retry<F, Fut, T>(
    profile: RetryProfile,
    cancel: &CancellationToken,
    should_retry: impl Fn(&Error) -> bool,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let config = profile.config();
    let mut last_error = None;
    let mut attempt = 1;

    while attempt <= config.max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        match operation(attempt as u32).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if is_rate_limited(&err) {
                    let wait = resolve_wait(&config, err.retry_after());
                    let info = RetryInfo { attempt: attempt as u32, status_code: err.status(), wait, reason: err.to_string() };
                    debug!(attempt = info.attempt, wait_ms = info.wait.as_millis() as u64, reason = %info.reason, "rate limited, retrying");
                    last_error = Some(err);
                    tokio::select! {
                        () = tokio::time::sleep(wait) => {}
                        () = cancel.cancelled() => return Err(Error::cancelled()),
                    }
                    continue;
                }

                if !should_retry(&err) {
                    return Err(err);
                }
                let is_last = attempt == config.max_attempts;
                if is_last {
                    last_error = Some(err);
                    break;
                }
                let wait = resolve_wait(&config, err.retry_after());
                let info = RetryInfo { attempt: attempt as u32, status_code: err.status(), wait, reason: err.to_string() };
                debug!(attempt = info.attempt, wait_ms = info.wait.as_millis() as u64, reason = %info.reason, "retrying");
                last_error = Some(err);
                tokio::select! {
                    () = tokio::time::sleep(wait) => {}
                    () = cancel.cancelled() => return Err(Error::cancelled()),
                }
            }
        }
        attempt += 1;
    }

    Err(last_error.unwrap_or_else(|| Error::transport("retry attempts exhausted", None, None)))
}
