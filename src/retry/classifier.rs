//! Generic "first predicate wins" retry-class classifier (§9 Design Notes).
//!
//! A list of `(predicate, profile)` pairs evaluated in order is easier to
//! audit than nested conditionals. The classic reconciler's known-timing-issue
//! table (§4.8) is built from this.

use super::RetryProfile;

/// What a classifier predicate is evaluated against: the failing API's id,
/// the HTTP status observed, and the response body (for substring matching).
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub api_id: &'a str,
    pub status: u16,
    pub body: &'a str,
}

/// One classification rule: if `predicate` matches, retry under `profile`.
pub struct RetryClassRule {
    pub name: &'static str,
    pub predicate: fn(&ClassifierInput<'_>) -> bool,
    pub profile: RetryProfile,
}

/// Evaluates `rules` in order against `input`, returning the first match.
#[must_use]
pub fn classify(rules: &[RetryClassRule], input: &ClassifierInput<'_>) -> Option<RetryProfile> {
    rules.iter().find(|rule| (rule.predicate)(input)).map(|rule| rule.profile)
}
