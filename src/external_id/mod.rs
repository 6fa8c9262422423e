//! Deterministic stable IDs derived from a [`Coordinate`] (§4.5).
//!
//! Two forms:
//! - **Settings 2.0**: `monaco:` + base64 of `{project$}type$configId`. When
//!   the encoded form would exceed 500 bytes, a hashed alternative is used
//!   instead (still `monaco:`-prefixed, always short).
//! - **Classic fallback**: `monaco-<uuidv3-of-coordinate>`, always ≤ 50 chars.
//!
//! Both are pure: the same [`Coordinate`] always yields the same id.

use crate::error::Error;
use crate::model::Coordinate;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use uuid::Uuid;

const MAX_SETTINGS_EXTERNAL_ID_LEN: usize = 500;

/// Namespace for the deterministic (MD5-based) UUIDv3 hashing fallback.
/// Fixed so that the same raw input always hashes to the same UUID.
const HASH_NAMESPACE: Uuid = Uuid::NAMESPACE_URL;

fn build_raw(project: &str, config_type: &str, config_id: &str) -> String {
    if project.is_empty() {
        format!("{config_type}${config_id}")
    } else {
        format!("{project}${config_type}${config_id}")
    }
}

fn hashed_form(raw: &str) -> String {
    let uuid = Uuid::new_v3(&HASH_NAMESPACE, raw.as_bytes());
    format!("monaco:{}", BASE64.encode(uuid.as_bytes()))
}

fn settings_id_from_raw(raw: &str, config_type: &str, config_id: &str) -> Result<String, Error> {
    if config_type.is_empty() && config_id.is_empty() {
        return Err(Error::input("external id generation requires type or configId"));
    }
    let full = format!("monaco:{}", BASE64.encode(raw));
    if full.len() <= MAX_SETTINGS_EXTERNAL_ID_LEN {
        Ok(full)
    } else {
        Ok(hashed_form(raw))
    }
}

/// The current (project-qualified) external id for a coordinate.
///
/// # Errors
/// Returns [`Error::input`] if both `config_type` and `config_id` are empty.
pub fn settings_external_id(coordinate: &Coordinate) -> Result<String, Error> {
    let raw = build_raw(&coordinate.project, &coordinate.config_type, &coordinate.config_id);
    settings_id_from_raw(&raw, &coordinate.config_type, &coordinate.config_id)
}

/// The legacy external id: the coordinate with `project` omitted (§4.7 step 3).
///
/// # Errors
/// Returns [`Error::input`] if both `config_type` and `config_id` are empty.
pub fn legacy_settings_external_id(coordinate: &Coordinate) -> Result<String, Error> {
    let raw = build_raw("", &coordinate.config_type, &coordinate.config_id);
    settings_id_from_raw(&raw, &coordinate.config_type, &coordinate.config_id)
}

/// The classic-API fallback id: `monaco-<uuidv3>`, always ≤ 50 characters.
#[must_use]
pub fn classic_external_id(coordinate: &Coordinate) -> String {
    let raw = format!("{}${}${}", coordinate.project, coordinate.config_type, coordinate.config_id);
    let uuid = Uuid::new_v3(&HASH_NAMESPACE, raw.as_bytes());
    format!("monaco-{uuid}")
}
