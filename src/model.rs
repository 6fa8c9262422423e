//! Core data types shared by the settings and classic reconcilers.
//!
//! These mirror the data model of a Dynatrace configuration-as-code deployment:
//! a locally declared [`Coordinate`]-addressed config is reconciled against a
//! remote [`DownloadedSettingsObject`] or classic [`Value`] row.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The project-level identity of a declared configuration.
///
/// Immutable once constructed. `(project, config_type, config_id)` is assumed
/// globally unique within a single deployment run; the core does not enforce
/// this itself, it is a caller invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub project: String,
    #[serde(rename = "type")]
    pub config_type: String,
    pub config_id: String,
}

impl Coordinate {
    #[must_use]
    pub fn new(project: impl Into<String>, config_type: impl Into<String>, config_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            config_type: config_type.into(),
            config_id: config_id.into(),
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.project.is_empty() {
            write!(f, "{}:{}", self.config_type, self.config_id)
        } else {
            write!(f, "{}:{}:{}", self.project, self.config_type, self.config_id)
        }
    }
}

/// How many all-users may do with an ACL-enabled settings schema (§4.7 Options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllUserPermission {
    None,
    Read,
    Write,
}

/// Positioning of an object within an ordered schema; either relative to
/// another object's id, or one of the front/back sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertAfter {
    Front,
    Back,
    ObjectId(String),
}

/// Options recognized by `SettingsReconciler::upsert` (§4.7).
#[derive(Debug, Clone, Default)]
pub struct SettingsUpsertOptions {
    /// Substitutes a retry profile for the submit call.
    pub override_retry: Option<crate::retry::RetryProfile>,
    /// Only meaningful on ordered schemas.
    pub insert_after: Option<InsertAfter>,
    /// ACL-enabled schemas only.
    pub all_user_permission: Option<AllUserPermission>,
}

/// Options recognized by `SettingsReconciler::list`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Narrows the field projection to omit value blobs.
    pub discard_value: bool,
}

/// A declared Settings 2.0 object, produced by the (out-of-scope) template layer.
///
/// Invariant: `content` must be valid JSON; `scope` must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsObject {
    pub coordinate: Coordinate,
    pub schema_id: String,
    pub schema_version: String,
    /// The entity id this object applies to, or the literal `"tenant"`.
    pub scope: String,
    /// Opaque JSON bytes; validated to be well-formed JSON at construction.
    pub content: Vec<u8>,
    /// A remote object id recorded by a prior download, if any.
    pub origin_object_id: Option<String>,
}

impl SettingsObject {
    /// Validates the `content` and `scope` invariants.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::InputError`] if `content` is not valid JSON
    /// or `scope` is empty.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.scope.is_empty() {
            return Err(crate::error::Error::input("SettingsObject.scope must be non-empty"));
        }
        serde_json::from_slice::<JsonValue>(&self.content)
            .map_err(|e| crate::error::Error::input(format!("SettingsObject.content is not valid JSON: {e}")))?;
        Ok(())
    }

    /// Parses `content` into a [`JsonValue`].
    ///
    /// # Errors
    /// Returns [`crate::error::Error::InputError`] if `content` is not valid JSON.
    pub fn content_value(&self) -> Result<JsonValue, crate::error::Error> {
        serde_json::from_slice(&self.content)
            .map_err(|e| crate::error::Error::input(format!("SettingsObject.content is not valid JSON: {e}")))
    }
}

/// Modifiability metadata attached to a downloaded settings object (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Modifiability {
    pub is_deletable: bool,
    pub is_modifiable: bool,
    pub is_movable: bool,
    pub modifiable_paths: Vec<String>,
}

/// A remote Settings 2.0 object, as returned by list/get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedSettingsObject {
    pub object_id: String,
    #[serde(default)]
    pub external_id: String,
    pub schema_id: String,
    pub schema_version: String,
    pub scope: String,
    pub value: JsonValue,
    #[serde(default)]
    pub modifiability: Modifiability,
}

/// A single uniqueness constraint: a conjunction of JSON paths that together
/// must be unique within a scope.
pub type UniquePropertyTuple = Vec<String>;

/// A Settings 2.0 schema descriptor (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub schema_id: String,
    pub ordered: bool,
    pub unique_properties: Vec<UniquePropertyTuple>,
    /// Whether this schema supports owner-based access control (§4.7 step 8).
    #[serde(default)]
    pub acl_enabled: bool,
}

/// A remote classic object's summary entry, produced by listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<JsonValue>,
}

/// The return of any successful upsert. `id` is non-empty on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynatraceEntity {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl DynatraceEntity {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }
}
