//! Common capability set shared by both reconcilers and the dry-run shadow
//! (§9 Design Notes): `{list, get, upsert, delete}`. The deployment layer
//! consumes either family through these traits rather than the concrete
//! reconciler types, so a dry-run run can swap in [`crate::dryrun::DryRunShadow`]
//! without the caller knowing the difference.

use crate::classic::ClassicReconciler;
use crate::error::Error;
use crate::model::{DownloadedSettingsObject, DynatraceEntity, ListOptions, SettingsObject, SettingsUpsertOptions, Value};
use crate::settings::SettingsReconciler;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

/// The Settings 2.0 surface: implemented by [`SettingsReconciler`] and by
/// the dry-run shadow.
#[async_trait]
pub trait SettingsContract: Send + Sync {
    async fn list(&self, schema_id: &str, options: &ListOptions, cancel: &CancellationToken) -> Result<Vec<DownloadedSettingsObject>, Error>;
    async fn get(&self, object_id: &str, cancel: &CancellationToken) -> Result<DownloadedSettingsObject, Error>;
    async fn upsert(&self, obj: &SettingsObject, options: &SettingsUpsertOptions, cancel: &CancellationToken) -> Result<DynatraceEntity, Error>;
    async fn delete(&self, object_id: &str, cancel: &CancellationToken) -> Result<(), Error>;
}

/// The classic Config API surface: implemented by [`ClassicReconciler`] and
/// by the dry-run shadow.
#[async_trait]
pub trait ClassicContract: Send + Sync {
    async fn list(&self, api: &str, cancel: &CancellationToken) -> Result<Vec<Value>, Error>;
    async fn get(&self, api: &str, id: &str, cancel: &CancellationToken) -> Result<Value, Error>;
    async fn upsert(&self, api: &str, name: &str, payload: &JsonValue, cancel: &CancellationToken) -> Result<DynatraceEntity, Error>;
    async fn delete(&self, api: &str, id: &str, cancel: &CancellationToken) -> Result<(), Error>;
}

#[async_trait]
impl SettingsContract for SettingsReconciler {
    async fn list(&self, schema_id: &str, options: &ListOptions, cancel: &CancellationToken) -> Result<Vec<DownloadedSettingsObject>, Error> {
        Self::list(self, schema_id, options, cancel).await
    }

    async fn get(&self, object_id: &str, cancel: &CancellationToken) -> Result<DownloadedSettingsObject, Error> {
        Self::get(self, object_id, cancel).await
    }

    async fn upsert(&self, obj: &SettingsObject, options: &SettingsUpsertOptions, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        Self::upsert(self, obj, options, cancel).await
    }

    async fn delete(&self, object_id: &str, cancel: &CancellationToken) -> Result<(), Error> {
        Self::delete(self, object_id, cancel).await
    }
}

#[async_trait]
impl ClassicContract for ClassicReconciler {
    async fn list(&self, api: &str, cancel: &CancellationToken) -> Result<Vec<Value>, Error> {
        Self::list(self, api, cancel).await
    }

    async fn get(&self, api: &str, id: &str, cancel: &CancellationToken) -> Result<Value, Error> {
        Self::get(self, api, id, cancel).await
    }

    async fn upsert(&self, api: &str, name: &str, payload: &JsonValue, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        Self::upsert_by_name(self, api, name, payload, cancel).await
    }

    async fn delete(&self, api: &str, id: &str, cancel: &CancellationToken) -> Result<(), Error> {
        Self::delete(self, api, id, cancel).await
    }
}
