//! Settings 2.0 reconciler — the identity-resolution heart of the core (§4.7).

use crate::cache::{Cache, InMemoryCache};
use crate::error::Error;
use crate::external_id;
use crate::http::DynatraceClient;
use crate::model::{
    AllUserPermission, DownloadedSettingsObject, DynatraceEntity, InsertAfter, ListOptions, Modifiability, Schema,
    SettingsObject, SettingsUpsertOptions,
};
use crate::pagination::{self, Page};
use crate::retry::RetryProfile;
use crate::schema::SchemaRegistry;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// That schema is key-property addressed server-side; externalId/objectId
/// resolution is skipped entirely (§4.7 step 5, §8).
const ONEAGENT_FEATURES_SCHEMA: &str = "builtin:oneagent.features";

/// The dashboard-shape guard (§4.8's "vice versa") mirrors the classic
/// reconciler's check in the other direction: a v1-shaped payload (no
/// `dashboardMetadata`) belongs on the classic endpoint, not here.
const DASHBOARD_SCHEMA: &str = "builtin:dashboards.general";

fn validate_dashboard_shape(schema_id: &str, content: &JsonValue) -> Result<(), Error> {
    if schema_id == DASHBOARD_SCHEMA && content.get("dashboardMetadata").is_none() {
        return Err(Error::input("dashboard payload uses the v1 shape; deploy it through the classic reconciler instead"));
    }
    Ok(())
}

/// Tenant server versions older than this cannot update non-deletable
/// objects (§4.7 step 1).
const MIN_VERSION_FOR_NON_DELETABLE_UPDATE: (u32, u32, u32) = (1, 262, 0);

fn parse_version(raw: &str) -> Option<(u32, u32, u32)> {
    let mut parts = raw.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let patch = parts.next().unwrap_or("0").parse().unwrap_or(0);
    Some((major, minor, patch))
}

/// Resolves a `/`-separated path recursively through nested objects. Arrays
/// and any other non-object node along the path short-circuit to no match
/// (§9 Value-path extraction).
fn extract_path<'v>(value: &'v JsonValue, path: &str) -> Option<&'v JsonValue> {
    let mut current = value;
    for segment in path.split('/') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn tuple_matches(tuple: &[String], declared: &JsonValue, remote: &JsonValue) -> bool {
    tuple.iter().all(|key| {
        match (extract_path(declared, key), extract_path(remote, key)) {
            (Some(d), Some(r)) if !d.is_null() && !r.is_null() => d == r,
            _ => false,
        }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ResourceContext {
    #[serde(default)]
    operations: Vec<String>,
    #[serde(default)]
    movable: bool,
    #[serde(default, rename = "modifiablePaths")]
    modifiable_paths: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModificationInfo {
    #[serde(default)]
    deletable: bool,
    #[serde(default)]
    modifiable: bool,
    #[serde(default)]
    movable: bool,
    #[serde(default, rename = "modifiablePaths")]
    modifiable_paths: Vec<String>,
}

fn resolve_modifiability(resource_context: Option<ResourceContext>, modification_info: Option<ModificationInfo>) -> Modifiability {
    if let Some(rc) = resource_context {
        Modifiability {
            is_deletable: rc.operations.iter().any(|op| op == "delete"),
            is_modifiable: rc.operations.iter().any(|op| op == "write"),
            is_movable: rc.movable,
            modifiable_paths: rc.modifiable_paths,
        }
    } else if let Some(mi) = modification_info {
        Modifiability {
            is_deletable: mi.deletable,
            is_modifiable: mi.modifiable,
            is_movable: mi.movable,
            modifiable_paths: mi.modifiable_paths,
        }
    } else {
        Modifiability::default()
    }
}

#[derive(Debug, Deserialize)]
struct DownloadedSettingsObjectWire {
    #[serde(rename = "objectId")]
    object_id: String,
    #[serde(default, rename = "externalId")]
    external_id: String,
    #[serde(rename = "schemaId")]
    schema_id: String,
    #[serde(default, rename = "schemaVersion")]
    schema_version: String,
    scope: String,
    value: JsonValue,
    #[serde(default, rename = "resourceContext")]
    resource_context: Option<ResourceContext>,
    #[serde(default, rename = "modificationInfo")]
    modification_info: Option<ModificationInfo>,
}

impl From<DownloadedSettingsObjectWire> for DownloadedSettingsObject {
    fn from(wire: DownloadedSettingsObjectWire) -> Self {
        Self {
            object_id: wire.object_id,
            external_id: wire.external_id,
            schema_id: wire.schema_id,
            schema_version: wire.schema_version,
            scope: wire.scope,
            value: wire.value,
            modifiability: resolve_modifiability(wire.resource_context, wire.modification_info),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsListResponse {
    #[serde(default)]
    items: Vec<DownloadedSettingsObjectWire>,
    #[serde(default, rename = "nextPageKey")]
    next_page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpsertResponseItem {
    #[serde(rename = "objectId")]
    object_id: String,
}

/// Reconciles declared [`SettingsObject`]s against a tenant's Settings 2.0
/// objects, implementing the eight-step identity-resolution algorithm.
pub struct SettingsReconciler {
    client: DynatraceClient,
    schemas: SchemaRegistry,
    list_cache: InMemoryCache<Arc<[DownloadedSettingsObject]>>,
    tenant_version: Option<(u32, u32, u32)>,
}

impl SettingsReconciler {
    #[must_use]
    pub fn new(client: DynatraceClient, schemas: SchemaRegistry) -> Self {
        Self {
            client,
            schemas,
            list_cache: InMemoryCache::new(),
            tenant_version: None,
        }
    }

    /// Attaches a known tenant server version, enabling the §4.7 step-1
    /// compatibility gate. Unparsable strings are ignored with a warning.
    #[must_use]
    pub fn with_tenant_version(mut self, version: &str) -> Self {
        match parse_version(version) {
            Some(v) => self.tenant_version = Some(v),
            None => warn!(version, "could not parse tenant server version, compatibility gate disabled"),
        }
        self
    }

    /// Lists every remote object in `schema_id`, applying the cache policy
    /// (§4.7 List cache policy): paginate on miss, store the full result,
    /// apply the caller's field-discard filter afterward.
    ///
    /// # Errors
    /// Propagates transport and pagination failures.
    pub async fn list(&self, schema_id: &str, options: &ListOptions, cancel: &CancellationToken) -> Result<Vec<DownloadedSettingsObject>, Error> {
        let all = self.list_raw(schema_id, cancel).await?;
        Ok(if options.discard_value {
            all.iter()
                .cloned()
                .map(|mut o| {
                    o.value = JsonValue::Null;
                    o
                })
                .collect()
        } else {
            all.to_vec()
        })
    }

    async fn list_raw(&self, schema_id: &str, cancel: &CancellationToken) -> Result<Arc<[DownloadedSettingsObject]>, Error> {
        if let Some(cached) = self.list_cache.get(schema_id).await {
            return Ok(cached);
        }

        let params = vec![
            ("schemaIds".to_string(), schema_id.to_string()),
            ("pageSize".to_string(), "500".to_string()),
        ];
        let items: Vec<DownloadedSettingsObject> = pagination::paginate("/api/v2/settings/objects", params, |query| async move {
            let response = self
                .client
                .call_with_retry(Method::GET, "/api/v2/settings/objects", &query, None, RetryProfile::Normal, cancel, |_| true)
                .await?;
            let page: SettingsListResponse = serde_json::from_str(&response.body)?;
            Ok((
                Page {
                    items: page.items.into_iter().map(DownloadedSettingsObject::from).collect(),
                    next_page_key: page.next_page_key,
                },
                Some(response.status),
            ))
        })
        .await?;

        let arc: Arc<[DownloadedSettingsObject]> = Arc::from(items);
        self.list_cache.set(schema_id.to_string(), arc.clone()).await;
        Ok(arc)
    }

    /// Fetches a single remote object by id.
    ///
    /// # Errors
    /// Returns [`Error::not_found`] on HTTP 400 or 404 (§7, §8).
    pub async fn get(&self, object_id: &str, cancel: &CancellationToken) -> Result<DownloadedSettingsObject, Error> {
        let path = format!("/api/v2/settings/objects/{object_id}");
        let response = self
            .client
            .call_with_retry(Method::GET, &path, &[], None, RetryProfile::Normal, cancel, |e| {
                e.status() != Some(400) && e.status() != Some(404)
            })
            .await
            .map_err(|e| e.status().and_then(Error::from_settings_status).unwrap_or(e))?;
        let wire: DownloadedSettingsObjectWire = serde_json::from_str(&response.body)?;
        Ok(wire.into())
    }

    /// Deletes a remote object by id.
    ///
    /// # Errors
    /// Returns [`Error::not_found`] on HTTP 400 or 404; propagates other
    /// transport failures.
    pub async fn delete(&self, object_id: &str, cancel: &CancellationToken) -> Result<(), Error> {
        let path = format!("/api/v2/settings/objects/{object_id}");
        self.client
            .call_with_retry(Method::DELETE, &path, &[], None, RetryProfile::Normal, cancel, |e| {
                e.status() != Some(400) && e.status() != Some(404)
            })
            .await
            .map(|_| ())
            .map_err(|e| e.status().and_then(Error::from_settings_status).unwrap_or(e))
    }

    async fn match_unique_constraints(&self, schema: &Schema, obj: &SettingsObject, cancel: &CancellationToken) -> Result<Option<String>, Error> {
        if schema.unique_properties.is_empty() {
            return Ok(None);
        }
        let declared = obj.content_value()?;
        let remote = self.list_raw(&schema.schema_id, cancel).await?;

        let mut matched_ids: Vec<String> = Vec::new();
        for tuple in &schema.unique_properties {
            for candidate in remote.iter() {
                if candidate.scope != obj.scope {
                    continue;
                }
                if tuple_matches(tuple, &declared, &candidate.value) && !matched_ids.contains(&candidate.object_id) {
                    matched_ids.push(candidate.object_id.clone());
                }
            }
        }

        match matched_ids.len() {
            0 => Ok(None),
            1 => Ok(Some(matched_ids.remove(0))),
            _ => Err(Error::ambiguous_match(&schema.schema_id, &matched_ids)),
        }
    }

    async fn legacy_external_id_probe(&self, schema_id: &str, coordinate: &crate::model::Coordinate, cancel: &CancellationToken) -> Result<Option<String>, Error> {
        let legacy_id = external_id::legacy_settings_external_id(coordinate)?;
        let remote = self.list_raw(schema_id, cancel).await?;
        Ok(remote.iter().find(|r| r.external_id == legacy_id).map(|r| r.object_id.clone()))
    }

    async fn current_external_id_and_origin_probe(
        &self,
        schema_id: &str,
        current_external_id: &str,
        origin_object_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Error> {
        let remote = self.list_raw(schema_id, cancel).await?;
        let matches: Vec<&DownloadedSettingsObject> = remote
            .iter()
            .filter(|r| r.external_id == current_external_id || Some(r.object_id.as_str()) == origin_object_id)
            .collect();

        Ok(match matches.len() {
            0 => None,
            1 => Some(matches[0].object_id.clone()),
            _ => matches
                .iter()
                .find(|r| r.external_id == current_external_id)
                .or_else(|| matches.first())
                .map(|r| r.object_id.clone()),
        })
    }

    /// Creates or updates `obj`, running the full §4.7 identity-resolution
    /// algorithm: tenant-version gate, unique-constraint match, legacy and
    /// current external-id probes, request submission, and (for ACL-enabled
    /// schemas) all-users permission reconciliation.
    ///
    /// # Errors
    /// Returns [`Error::input`] (malformed content, `insertAfter` on an
    /// unordered schema), [`Error::schema`], [`Error::ambiguous_match`], or
    /// a transport error on submission failure.
    pub async fn upsert(&self, obj: &SettingsObject, options: &SettingsUpsertOptions, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        obj.validate()?;
        let schema = self.schemas.get_schema(&obj.schema_id, cancel).await?;

        if let Some(version) = self.tenant_version {
            if version < MIN_VERSION_FOR_NON_DELETABLE_UPDATE {
                if let Some(origin_id) = &obj.origin_object_id {
                    if let Ok(existing) = self.get(origin_id, cancel).await {
                        return Ok(DynatraceEntity::new(existing.object_id.clone(), existing.object_id));
                    }
                }
            }
        }

        let current_external_id = external_id::settings_external_id(&obj.coordinate)?;

        let mut target = self.match_unique_constraints(&schema, obj, cancel).await?;
        if target.is_none() {
            target = self.legacy_external_id_probe(&schema.schema_id, &obj.coordinate, cancel).await?;
        }
        if let Some(resolved) = self
            .current_external_id_and_origin_probe(&schema.schema_id, &current_external_id, obj.origin_object_id.as_deref(), cancel)
            .await?
        {
            target = Some(resolved);
        }

        let body = self.build_upsert_body(&schema, obj, &current_external_id, target.as_deref(), options)?;

        let result = self
            .client
            .call_with_retry(
                Method::POST,
                "/api/v2/settings/objects",
                &[],
                Some(body),
                options.override_retry.unwrap_or(RetryProfile::Normal),
                cancel,
                |_| true,
            )
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                self.list_cache.delete(&schema.schema_id).await;
                return Err(e);
            }
        };

        let items: Vec<UpsertResponseItem> = serde_json::from_str(&response.body)?;
        let entity = match items.len() {
            0 => return Err(Error::transport("empty response from settings upsert", Some(response.status), None)),
            1 => DynatraceEntity::new(items[0].object_id.clone(), items[0].object_id.clone()),
            _ => return Err(Error::transport("too many elements in settings upsert response", Some(response.status), None)),
        };

        if schema.acl_enabled {
            if let Some(permission) = options.all_user_permission {
                self.apply_all_user_permission(&entity.id, permission, cancel).await?;
            }
        }

        Ok(entity)
    }

    fn build_upsert_body(
        &self,
        schema: &Schema,
        obj: &SettingsObject,
        current_external_id: &str,
        target: Option<&str>,
        options: &SettingsUpsertOptions,
    ) -> Result<Vec<u8>, Error> {
        let declared_value = obj.content_value()?;
        validate_dashboard_shape(&schema.schema_id, &declared_value)?;

        let (external_id_field, object_id_field): (&str, &str) = if schema.schema_id == ONEAGENT_FEATURES_SCHEMA {
            ("", "")
        } else {
            (current_external_id, target.unwrap_or(""))
        };

        let mut entry = json!({
            "schemaId": schema.schema_id,
            "externalId": external_id_field,
            "scope": obj.scope,
            "value": declared_value,
            "schemaVersion": obj.schema_version,
        });

        if !object_id_field.is_empty() {
            entry["objectId"] = json!(object_id_field);
        }

        if let Some(insert_after) = &options.insert_after {
            if !schema.ordered {
                return Err(Error::input("insertAfter is only valid on ordered schemas"));
            }
            match insert_after {
                InsertAfter::Front => entry["insertAfter"] = json!(""),
                InsertAfter::Back => {}
                InsertAfter::ObjectId(id) => entry["insertAfter"] = json!(id),
            }
        }

        serde_json::to_vec(&json!([entry])).map_err(Error::from)
    }

    async fn apply_all_user_permission(&self, object_id: &str, permission: AllUserPermission, cancel: &CancellationToken) -> Result<(), Error> {
        let path = format!("/api/v2/settings/objects/{object_id}/permissions/all-users");

        if permission == AllUserPermission::None {
            let _ = self.client.call_with_retry(Method::DELETE, &path, &[], None, RetryProfile::Normal, cancel, |_| true).await;
            return Ok(());
        }

        let permission_str = match permission {
            AllUserPermission::Read => "read",
            AllUserPermission::Write => "write",
            AllUserPermission::None => unreachable!(),
        };
        let body = serde_json::to_vec(&json!({"permissions": [permission_str]}))?;

        match self.client.call(Method::GET, &path, &[], None).await {
            Ok(_) => {
                self.client
                    .call_with_retry(Method::PUT, &path, &[], Some(body), RetryProfile::Normal, cancel, |_| true)
                    .await?;
            }
            Err(e) if e.status() == Some(404) => {
                self.client
                    .call_with_retry(Method::POST, &path, &[], Some(body), RetryProfile::Normal, cancel, |_| true)
                    .await?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinate;
    use crate::schema::SchemaRegistry;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_reconciler(server: &MockServer) -> SettingsReconciler {
        let client = DynatraceClient::with_concurrency(server.uri(), Arc::from("token"), 4);
        SettingsReconciler::new(client.clone(), SchemaRegistry::new(client, false))
    }

    fn settings_object(scope: &str, content: serde_json::Value) -> SettingsObject {
        SettingsObject {
            coordinate: Coordinate::new("project", "builtin:tags.auto-tagging", "config-id"),
            schema_id: "builtin:tags.auto-tagging".to_string(),
            schema_version: "1.0.0".to_string(),
            scope: scope.to_string(),
            content: serde_json::to_vec(&content).unwrap(),
            origin_object_id: None,
        }
    }

    async fn mount_schema(server: &MockServer, unique_properties: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/schemas/builtin:tags.auto-tagging"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ordered": false,
                "constraints": [{"type": "UNIQUE", "uniqueProperties": unique_properties}],
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn unique_constraint_match_respects_scope() {
        let server = MockServer::start().await;
        mount_schema(&server, serde_json::json!([["key_1"]])).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"objectId": "o1", "schemaId": "builtin:tags.auto-tagging", "scope": "HOST-1", "value": {"key_1": "NO"}},
                    {"objectId": "o2", "schemaId": "builtin:tags.auto-tagging", "scope": "HOST-1", "value": {"key_1": "YES"}},
                    {"objectId": "o3", "schemaId": "builtin:tags.auto-tagging", "scope": "HOST-2", "value": {"key_1": "YES"}},
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/settings/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"objectId": "o2"}])))
            .mount(&server)
            .await;

        let reconciler = make_reconciler(&server);
        let obj = settings_object("HOST-1", serde_json::json!({"key_1": "YES"}));
        let entity = reconciler.upsert(&obj, &SettingsUpsertOptions::default(), &CancellationToken::new()).await.unwrap();
        assert_eq!(entity.id, "o2");
    }

    #[tokio::test]
    async fn two_target_reconciliation_prefers_external_id() {
        let server = MockServer::start().await;
        mount_schema(&server, serde_json::json!([])).await;
        let current_id = external_id::settings_external_id(&Coordinate::new("project", "builtin:tags.auto-tagging", "config-id")).unwrap();
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"objectId": "A", "schemaId": "builtin:tags.auto-tagging", "scope": "tenant", "externalId": current_id, "value": {}},
                    {"objectId": "B", "schemaId": "builtin:tags.auto-tagging", "scope": "tenant", "externalId": "", "value": {}},
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/settings/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"objectId": "A"}])))
            .mount(&server)
            .await;

        let reconciler = make_reconciler(&server);
        let mut obj = settings_object("tenant", serde_json::json!({}));
        obj.origin_object_id = Some("B".to_string());
        let entity = reconciler.upsert(&obj, &SettingsUpsertOptions::default(), &CancellationToken::new()).await.unwrap();
        assert_eq!(entity.id, "A");
    }

    #[tokio::test]
    async fn version_gate_returns_existing_without_writing() {
        let server = MockServer::start().await;
        mount_schema(&server, serde_json::json!([])).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/objects/X"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objectId": "X", "schemaId": "builtin:tags.auto-tagging", "scope": "tenant", "value": {}
            })))
            .mount(&server)
            .await;

        let client = DynatraceClient::with_concurrency(server.uri(), Arc::from("token"), 4);
        let reconciler = SettingsReconciler::new(client.clone(), SchemaRegistry::new(client, false)).with_tenant_version("1.260.0");
        let mut obj = settings_object("tenant", serde_json::json!({}));
        obj.origin_object_id = Some("X".to_string());
        let entity = reconciler.upsert(&obj, &SettingsUpsertOptions::default(), &CancellationToken::new()).await.unwrap();
        assert_eq!(entity.id, "X");
    }

    struct HasEmptyExternalIdAndNoObjectId;

    impl wiremock::Match for HasEmptyExternalIdAndNoObjectId {
        fn matches(&self, request: &wiremock::Request) -> bool {
            let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
                return false;
            };
            body[0]["externalId"] == "" && body[0].get("objectId").is_none()
        }
    }

    #[tokio::test]
    async fn oneagent_features_forces_empty_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/schemas/builtin:oneagent.features"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ordered": false, "constraints": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/settings/objects"))
            .and(HasEmptyExternalIdAndNoObjectId)
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"objectId": "o1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = make_reconciler(&server);
        let mut obj = settings_object("tenant", serde_json::json!({}));
        obj.schema_id = "builtin:oneagent.features".to_string();
        obj.coordinate = Coordinate::new("project", "builtin:oneagent.features", "config-id");
        reconciler.upsert(&obj, &SettingsUpsertOptions::default(), &CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn insert_after_on_unordered_schema_is_rejected() {
        let server = MockServer::start().await;
        mount_schema(&server, serde_json::json!([])).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let reconciler = make_reconciler(&server);
        let obj = settings_object("tenant", serde_json::json!({}));
        let options = SettingsUpsertOptions {
            insert_after: Some(InsertAfter::Front),
            ..Default::default()
        };
        let err = reconciler.upsert(&obj, &options, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
    }

    #[tokio::test]
    async fn v1_shaped_dashboard_payload_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/settings/schemas/builtin:dashboards.general"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ordered": false, "constraints": []})))
            .mount(&server)
            .await;

        let reconciler = make_reconciler(&server);
        let mut obj = settings_object("tenant", serde_json::json!({"tiles": []}));
        obj.schema_id = "builtin:dashboards.general".to_string();
        obj.coordinate = Coordinate::new("project", "builtin:dashboards.general", "config-id");
        let err = reconciler.upsert(&obj, &SettingsUpsertOptions::default(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
    }

    #[test]
    fn extract_path_short_circuits_through_arrays() {
        let value = serde_json::json!({"a": [1, 2, 3]});
        assert_eq!(extract_path(&value, "a/b"), None);
    }

    #[test]
    fn extract_path_resolves_nested_maps() {
        let value = serde_json::json!({"a": {"b": {"c": 42}}});
        assert_eq!(extract_path(&value, "a/b/c"), Some(&serde_json::json!(42)));
    }
}
