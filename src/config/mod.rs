//! A small typed settings reader over environment variables (§1A, §6): the
//! concurrency cap, log format, log timestamp mode, and feature flags. Every
//! value falls back to a documented default on an unset or unrecognized
//! input rather than failing startup, mirroring the corpus's env-var
//! handling in `cli::tracing_init` and its `config::settings` module.

/// Parses a leniently truthy environment value. `"1"`, `"true"`, `"yes"`,
/// `"on"` are truthy (case-insensitive, surrounding whitespace ignored);
/// everything else, including unset, is falsy.
#[must_use]
pub fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Reads a boolean environment variable with [`is_truthy`], defaulting to
/// `false` when unset.
#[must_use]
pub fn flag_from_env(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| is_truthy(&v))
}

/// Log output format (§6): `MONACO_LOG_FORMAT=json` or `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Reads `MONACO_LOG_FORMAT`, falling back to [`Self::Text`] and
    /// warning on an unrecognized value rather than rejecting it.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("MONACO_LOG_FORMAT") {
            Err(_) => Self::Text,
            Ok(raw) => match raw.to_lowercase().as_str() {
                "json" => Self::Json,
                "text" => Self::Text,
                _ => {
                    tracing::warn!(value = %raw, "unrecognized MONACO_LOG_FORMAT, falling back to text");
                    Self::Text
                }
            },
        }
    }
}

/// Ambient settings read once at startup. Constructing this after
/// [`crate::logging::init_tracing`] lets unrecognized values warn through
/// `tracing` instead of `eprintln!`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub concurrent_requests: usize,
    pub log_format: LogFormat,
    pub log_utc: bool,
    pub log_to_file: bool,
    pub acl_enabled: bool,
    pub service_user_support: bool,
    pub filter_unmodifiable_settings: bool,
    pub update_non_unique_if_single_exists: bool,
}

impl Settings {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            concurrent_requests: crate::http::concurrency_limit_from_env(),
            log_format: LogFormat::from_env(),
            log_utc: flag_from_env("MONACO_LOG_UTC"),
            log_to_file: flag_from_env("MONACO_LOG_TO_FILE"),
            acl_enabled: flag_from_env("MONACO_FEATURE_ACL"),
            service_user_support: flag_from_env("MONACO_FEATURE_SERVICE_USER"),
            filter_unmodifiable_settings: flag_from_env("MONACO_FEATURE_FILTER_UNMODIFIABLE_SETTINGS"),
            update_non_unique_if_single_exists: flag_from_env("MONACO_FEATURE_UPDATE_NON_UNIQUE_IF_SINGLE_EXISTS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_are_recognized_case_insensitively() {
        for v in ["1", "true", "TRUE", "Yes", "on"] {
            assert!(is_truthy(v), "expected {v:?} to be truthy");
        }
        for v in ["0", "false", "no", "off", "", "garbage"] {
            assert!(!is_truthy(v), "expected {v:?} to be falsy");
        }
    }

    #[test]
    fn flag_from_env_defaults_false_when_unset() {
        assert!(!flag_from_env("MONACO_TEST_FLAG_DOES_NOT_EXIST"));
    }
}
