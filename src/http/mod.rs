//! Shared HTTP transport: concurrency limiting and Dynatrace response
//! handling (§5, §6).
//!
//! Every outbound call passes through [`DynatraceClient::call`], which
//! acquires a permit from a process-wide [`Semaphore`] before dispatching —
//! the suspension point the concurrency model places at HTTP call
//! boundaries.

use crate::error::Error;
use crate::retry::{self, RetryProfile};
use reqwest::{Method, RequestBuilder};
use std::sync::{Arc, Once};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_CONCURRENT_REQUESTS: usize = 5;

static CRYPTO_PROVIDER_INIT: Once = Once::new();

/// Installs the process-wide rustls crypto provider backing `reqwest`'s
/// `rustls-no-provider` feature. `reqwest` does not install one on its own;
/// without this, the first real TLS handshake fails at runtime. Idempotent
/// and safe to call from every client constructor.
fn install_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        #[cfg(not(windows))]
        let provider = rustls::crypto::ring::default_provider();
        #[cfg(windows)]
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        let _ = provider.install_default();
    });
}

/// Reads `MONACO_CONCURRENT_REQUESTS`, clamped to at least 1. An invalid or
/// missing value falls back to the default of 5, with a logged warning.
#[must_use]
pub fn concurrency_limit_from_env() -> usize {
    match std::env::var("MONACO_CONCURRENT_REQUESTS") {
        Err(_) => DEFAULT_CONCURRENT_REQUESTS,
        Ok(raw) => match raw.parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => {
                warn!(value = %raw, default = DEFAULT_CONCURRENT_REQUESTS, "invalid MONACO_CONCURRENT_REQUESTS, using default");
                DEFAULT_CONCURRENT_REQUESTS
            }
        },
    }
}

/// One fully read HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub headers: reqwest::header::HeaderMap,
}

/// Whether Settings 2.0 paths are addressed directly or through the
/// platform API gateway's classic-environment prefix (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Classic,
    Platform,
}

/// A bearer-authenticated Dynatrace API client bounded by a shared
/// concurrent-request limiter. Cheap to clone: the limiter and HTTP
/// connection pool are shared via `Arc`/internal reference counting.
#[derive(Clone)]
pub struct DynatraceClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<str>,
    limiter: Arc<Semaphore>,
    flavor: Flavor,
}

impl DynatraceClient {
    /// Constructs a client sized from `MONACO_CONCURRENT_REQUESTS` (§6).
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<Arc<str>>) -> Self {
        Self::with_concurrency(base_url, token, concurrency_limit_from_env())
    }

    #[must_use]
    pub fn with_concurrency(base_url: impl Into<String>, token: impl Into<Arc<str>>, concurrency: usize) -> Self {
        install_crypto_provider();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            flavor: Flavor::Classic,
        }
    }

    /// Switches this client to platform flavor: Settings 2.0 paths are
    /// rewritten onto the platform API gateway's classic-environment prefix
    /// (`/platform/classic/environment-api/v2/settings/...`) instead of being
    /// addressed directly (`/api/v2/settings/...`). Callers always pass the
    /// direct path; the rewrite happens here so reconcilers stay unaware of
    /// which gateway they are talking through.
    #[must_use]
    pub const fn platform(mut self) -> Self {
        self.flavor = Flavor::Platform;
        self
    }

    fn url(&self, path: &str) -> String {
        let rewritten = match self.flavor {
            Flavor::Classic => None,
            Flavor::Platform => path
                .strip_prefix("/api/v2/settings")
                .map(|rest| format!("/platform/classic/environment-api/v2/settings{rest}")),
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), rewritten.as_deref().unwrap_or(path))
    }

    /// Executes one bounded, authenticated HTTP call.
    ///
    /// # Errors
    /// Returns [`Error::transport`] on a network failure or non-2xx
    /// response, carrying the status and body when available.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, Error> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| Error::transport("concurrency limiter closed", None, None))?;

        let mut builder: RequestBuilder = self.http.request(method, self.url(path)).bearer_auth(&self.token).query(query);
        if let Some(bytes) = body {
            builder = builder.header("content-type", "application/json").body(bytes);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string(), e.status().map(|s| s.as_u16()), None))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body_text = response.text().await.unwrap_or_default();

        if (200..300).contains(&status) {
            Ok(RawResponse { status, body: body_text, headers })
        } else {
            let retry_after = retry::parse_retry_after_header(&headers);
            Err(Error::transport_with_retry_after(format!("unexpected HTTP status {status}"), Some(status), Some(body_text), retry_after))
        }
    }

    /// Runs [`call`](Self::call) under a retry profile.
    ///
    /// # Errors
    /// See [`retry::execute_with_retry`].
    pub async fn call_with_retry(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
        profile: RetryProfile,
        cancel: &CancellationToken,
        should_retry: impl Fn(&Error) -> bool,
    ) -> Result<RawResponse, Error> {
        retry::execute_with_retry(profile, cancel, should_retry, |_attempt| {
            self.call(method.clone(), path, query, body.clone())
        })
        .await
    }
}
