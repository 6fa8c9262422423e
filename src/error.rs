//! Error taxonomy for the reconciliation core (§7).
//!
//! All internal errors are mapped to one of the seven [`ErrorKind`] categories.
//! Identity-probe `NotFound`s are absorbed by callers inside this crate; every
//! other kind is expected to surface to the deployment layer unchanged.

use std::borrow::Cow;
use thiserror::Error;

/// The seven error categories from §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Schema,
    AmbiguousMatch,
    Transport,
    NotFound,
    Compatibility,
    Cancelled,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "InputError",
            Self::Schema => "SchemaError",
            Self::AmbiguousMatch => "AmbiguousMatchError",
            Self::Transport => "TransportError",
            Self::NotFound => "NotFound",
            Self::Compatibility => "CompatibilityError",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured detail attached to an error, for diagnostics or programmatic use.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub fn with_detail(value: serde_json::Value) -> Self {
        Self {
            details: Some(value),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn and_suggestion(mut self, suggestion: impl Into<Cow<'static, str>>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },
}

impl Error {
    fn make(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            kind,
            message: message.into(),
            context: None,
        }
    }

    fn make_with_context(
        kind: ErrorKind,
        message: impl Into<Cow<'static, str>>,
        context: ErrorContext,
    ) -> Self {
        Self::Internal {
            kind,
            message: message.into(),
            context: Some(context),
        }
    }

    /// Malformed coordinate, non-JSON content, `insertAfter` on an unordered
    /// schema, missing required field in settings options.
    pub fn input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::make(ErrorKind::Input, message)
    }

    /// Unknown schema, or failure fetching schema detail.
    pub fn schema(message: impl Into<Cow<'static, str>>) -> Self {
        Self::make(ErrorKind::Schema, message)
    }

    /// Multiple unique-constraint matches; carries up to five matching object ids.
    pub fn ambiguous_match(schema_id: &str, object_ids: &[String]) -> Self {
        let shown: Vec<&String> = object_ids.iter().take(5).collect();
        Self::make_with_context(
            ErrorKind::AmbiguousMatch,
            format!(
                "multiple objects in schema '{schema_id}' match the unique-property constraints: {shown:?}"
            ),
            ErrorContext::with_detail(serde_json::json!({
                "schemaId": schema_id,
                "matchingObjectIds": shown,
            })),
        )
    }

    /// Non-retryable HTTP, body-parse failure, or retry exhaustion. Carries the
    /// underlying HTTP status and body when available.
    pub fn transport(message: impl Into<Cow<'static, str>>, status: Option<u16>, body: Option<String>) -> Self {
        Self::transport_with_retry_after(message, status, body, None)
    }

    /// Like [`Self::transport`], additionally carrying a parsed `Retry-After`
    /// delay — read back by the rate limiter via [`Self::retry_after`] (§4.2, §7).
    pub fn transport_with_retry_after(
        message: impl Into<Cow<'static, str>>,
        status: Option<u16>,
        body: Option<String>,
        retry_after: Option<std::time::Duration>,
    ) -> Self {
        Self::make_with_context(
            ErrorKind::Transport,
            message,
            ErrorContext::with_detail(serde_json::json!({
                "status": status,
                "body": body,
                "retryAfterSecs": retry_after.map(|d| d.as_secs()),
            })),
        )
    }

    /// Object does not exist. Recoverable during identity probes.
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::make(ErrorKind::NotFound, message)
    }

    /// Tenant server version too old for the requested update (§4.7 step 1).
    pub fn compatibility(message: impl Into<Cow<'static, str>>) -> Self {
        Self::make(ErrorKind::Compatibility, message)
    }

    /// Cooperative cancellation observed.
    pub fn cancelled() -> Self {
        Self::make(ErrorKind::Cancelled, "operation cancelled")
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Json(_) | Self::Network(_) => ErrorKind::Transport,
            Self::Internal { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }

    /// The HTTP status carried by a transport error's context, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        let Self::Internal { context, .. } = self else {
            return None;
        };
        context
            .as_ref()?
            .details
            .as_ref()?
            .get("status")?
            .as_u64()
            .map(|s| s as u16)
    }

    /// The `Retry-After` delay carried by a transport error, if any (§4.2).
    #[must_use]
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        let Self::Internal { context, .. } = self else {
            return None;
        };
        let secs = context.as_ref()?.details.as_ref()?.get("retryAfterSecs")?.as_u64()?;
        Some(std::time::Duration::from_secs(secs))
    }

    /// Maps an HTTP status observed on a settings endpoint to [`Error::not_found`]
    /// when it is 400 or 404 — the Settings API returns 400 instead of 404 on
    /// unknown object ids (§7, §8).
    #[must_use]
    pub fn from_settings_status(status: u16) -> Option<Self> {
        if status == 400 || status == 404 {
            Some(Self::not_found(format!("settings object not found (status {status})")))
        } else {
            None
        }
    }
}
