//! Dry-run shadow (§4.9): implements the same public surface as both
//! reconcilers but persists nothing to any tenant.
//!
//! Upserts render the request body that would have been sent and write it to
//! `output_dir` via [`crate::atomic::atomic_write`] (temp-file-then-rename, so
//! a concurrent reader never observes a partial file), then return a
//! deterministic synthesized id so repeated upserts of the same coordinate
//! within one run update rather than duplicate. `builtin:management-zones` is
//! special-cased: its id is a base64-encoded UUID, since downstream consumers
//! decode management-zone ids as base64 before reading them as numeric.
//!
//! Listing returns the in-memory state accumulated during the run, guarded
//! the same way the real list caches are (§4.1): a single `RwLock`, readers
//! run concurrently, writers are exclusive.

use crate::atomic::atomic_write;
use crate::contract::{ClassicContract, SettingsContract};
use crate::error::Error;
use crate::model::{DownloadedSettingsObject, DynatraceEntity, ListOptions, Modifiability, SettingsObject, SettingsUpsertOptions, Value};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const MANAGEMENT_ZONES_SCHEMA: &str = "builtin:management-zones";

/// Namespace for the deterministic id hashing; fixed so the same coordinate
/// or name always synthesizes the same id within and across runs.
const DRY_RUN_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

fn synthesize_id(schema_or_api: &str, key: &str) -> String {
    let raw = format!("{schema_or_api}${key}");
    if schema_or_api == MANAGEMENT_ZONES_SCHEMA {
        let uuid = Uuid::new_v3(&DRY_RUN_NAMESPACE, raw.as_bytes());
        BASE64.encode(uuid.as_bytes())
    } else {
        let uuid = Uuid::new_v3(&DRY_RUN_NAMESPACE, raw.as_bytes());
        format!("dryrun-{uuid}")
    }
}

fn file_safe(raw: &str) -> String {
    raw.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' }).collect()
}

/// One shadow type implements both reconciler contracts (§9 Open questions —
/// resolved): no separate `Dummy*`/`DryRun*` family.
pub struct DryRunShadow {
    output_dir: PathBuf,
    settings_entries: RwLock<Vec<DownloadedSettingsObject>>,
    classic_entries: RwLock<Vec<(String, Value)>>,
}

impl DryRunShadow {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings_entries: RwLock::new(Vec::new()),
            classic_entries: RwLock::new(Vec::new()),
        }
    }

    async fn record(&self, api_id: &str, name: &str, body: &JsonValue) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Error::transport(format!("dry-run output directory: {e}"), None, None))?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::transport(e.to_string(), None, None))?
            .as_nanos();
        let file_name = format!("{}-{}-{nanos}.json", file_safe(api_id), file_safe(name));
        let path = self.output_dir.join(file_name);
        let bytes = serde_json::to_vec_pretty(body)?;
        atomic_write(&path, &bytes).await.map_err(|e| Error::transport(e.to_string(), None, None))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsContract for DryRunShadow {
    async fn list(&self, schema_id: &str, options: &ListOptions, _cancel: &CancellationToken) -> Result<Vec<DownloadedSettingsObject>, Error> {
        let entries = self.settings_entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.schema_id == schema_id)
            .cloned()
            .map(|mut e| {
                if options.discard_value {
                    e.value = JsonValue::Null;
                }
                e
            })
            .collect())
    }

    async fn get(&self, object_id: &str, _cancel: &CancellationToken) -> Result<DownloadedSettingsObject, Error> {
        self.settings_entries
            .read()
            .await
            .iter()
            .find(|e| e.object_id == object_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("dry-run: no settings object '{object_id}' recorded this run")))
    }

    async fn upsert(&self, obj: &SettingsObject, _options: &SettingsUpsertOptions, _cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        obj.validate()?;
        let value = obj.content_value()?;
        let object_id = synthesize_id(&obj.schema_id, &obj.coordinate.to_string());

        self.record(
            &obj.schema_id,
            &obj.coordinate.config_id,
            &json!({
                "schemaId": obj.schema_id,
                "schemaVersion": obj.schema_version,
                "scope": obj.scope,
                "value": value,
            }),
        )
        .await?;

        let downloaded = DownloadedSettingsObject {
            object_id: object_id.clone(),
            external_id: crate::external_id::settings_external_id(&obj.coordinate).unwrap_or_default(),
            schema_id: obj.schema_id.clone(),
            schema_version: obj.schema_version.clone(),
            scope: obj.scope.clone(),
            value,
            modifiability: Modifiability::default(),
        };

        let mut entries = self.settings_entries.write().await;
        entries.retain(|e| e.object_id != object_id);
        entries.push(downloaded);

        Ok(DynatraceEntity::new(object_id.clone(), object_id))
    }

    async fn delete(&self, object_id: &str, _cancel: &CancellationToken) -> Result<(), Error> {
        self.settings_entries.write().await.retain(|e| e.object_id != object_id);
        Ok(())
    }
}

#[async_trait]
impl ClassicContract for DryRunShadow {
    async fn list(&self, api: &str, _cancel: &CancellationToken) -> Result<Vec<Value>, Error> {
        Ok(self.classic_entries.read().await.iter().filter(|(a, _)| a == api).map(|(_, v)| v.clone()).collect())
    }

    async fn get(&self, api: &str, id: &str, _cancel: &CancellationToken) -> Result<Value, Error> {
        self.classic_entries
            .read()
            .await
            .iter()
            .find(|(a, v)| a == api && v.id == id)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::not_found(format!("dry-run: no classic object '{id}' recorded in api '{api}' this run")))
    }

    async fn upsert(&self, api: &str, name: &str, payload: &JsonValue, _cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        let id = synthesize_id(api, name);
        self.record(api, name, payload).await?;

        let value = Value {
            id: id.clone(),
            name: name.to_string(),
            owner: None,
            custom_fields: payload.get("customFields").cloned(),
        };

        let mut entries = self.classic_entries.write().await;
        entries.retain(|(a, v)| !(a == api && v.id == id));
        entries.push((api.to_string(), value));

        Ok(DynatraceEntity::new(id, name.to_string()))
    }

    async fn delete(&self, api: &str, id: &str, _cancel: &CancellationToken) -> Result<(), Error> {
        self.classic_entries.write().await.retain(|(a, v)| !(a == api && v.id == id));
        Ok(())
    }
}
