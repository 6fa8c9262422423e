//! The dry-run shadow implements the same contracts as the live reconcilers,
//! so a caller holding a `Box<dyn SettingsContract>`/`Box<dyn ClassicContract>`
//! can swap dry-run in without branching on mode.

use monaco_reconcile::contract::{ClassicContract, SettingsContract};
use monaco_reconcile::dryrun::DryRunShadow;
use monaco_reconcile::model::{Coordinate, ListOptions, SettingsObject, SettingsUpsertOptions};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn settings_object() -> SettingsObject {
    SettingsObject {
        coordinate: Coordinate::new("project", "builtin:tags.auto-tagging", "config-id"),
        schema_id: "builtin:tags.auto-tagging".to_string(),
        schema_version: "1.0.0".to_string(),
        scope: "tenant".to_string(),
        content: serde_json::to_vec(&json!({"key": "value"})).unwrap(),
        origin_object_id: None,
    }
}

#[tokio::test]
async fn a_deployment_layer_can_hold_the_shadow_behind_the_settings_contract_trait_object() {
    let dir = TempDir::new().unwrap();
    let shadow: Box<dyn SettingsContract> = Box::new(DryRunShadow::new(dir.path()));
    let cancel = CancellationToken::new();

    let entity = shadow.upsert(&settings_object(), &SettingsUpsertOptions::default(), &cancel).await.unwrap();
    let listed = shadow.list("builtin:tags.auto-tagging", &ListOptions::default(), &cancel).await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].object_id, entity.id);
}

#[tokio::test]
async fn a_deployment_layer_can_hold_the_shadow_behind_the_classic_contract_trait_object() {
    let dir = TempDir::new().unwrap();
    let shadow: Box<dyn ClassicContract> = Box::new(DryRunShadow::new(dir.path()));
    let cancel = CancellationToken::new();

    let entity = shadow.upsert("alerting-profile", "My Profile", &json!({"name": "My Profile"}), &cancel).await.unwrap();
    let fetched = shadow.get("alerting-profile", &entity.id, &cancel).await.unwrap();

    assert_eq!(fetched.name, "My Profile");
}
